mod admin;
mod blob;
mod capabilities;
mod objects;

pub use admin::health;
pub use blob::{get_blob, put_blob};
pub use capabilities::{download_url, upload_url};
pub use objects::{create_folder, delete_object, list_objects, rename_object, search};
