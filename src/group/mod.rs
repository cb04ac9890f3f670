pub mod element_list;

pub use element_list::ElementList;
