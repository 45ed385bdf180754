pub mod ai;
pub mod composite;
pub mod request;
pub mod shapes;
pub mod wire;
