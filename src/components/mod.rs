pub mod coords;
pub mod credentials;
pub mod engine;
pub mod history;
pub mod paths;
pub mod slots;
pub mod tools;
