pub mod controller;
pub mod feed;
pub mod index;
pub mod model;
pub mod service;
