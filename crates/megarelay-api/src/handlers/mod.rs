pub mod fetch_image;
pub mod health;
pub mod upload;
