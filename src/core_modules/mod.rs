pub mod blob;
pub mod blob_detector;
pub mod bridge;
pub mod color_filter;
pub mod controller;
pub mod dispatcher;
pub mod motor;
pub mod overlay;
