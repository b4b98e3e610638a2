pub mod acl;
pub mod batch;
pub mod config;
pub mod db;
pub mod db_album;
pub mod db_file;
pub mod db_pool;
pub mod db_schema;
pub mod db_types;
pub mod db_user;
pub mod events;
pub mod file_index;
pub mod handlers_batch;
pub mod handlers_health;
pub mod handlers_session;
pub mod photo_delete;
pub mod primary_file;
pub mod warp_helpers;
