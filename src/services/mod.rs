pub mod locks;
pub mod menu;
