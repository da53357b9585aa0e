pub mod apply;
pub mod check;
pub mod list;
