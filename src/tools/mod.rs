mod path_validator;
mod time_format;
mod video_scanner;

pub use path_validator::{ensure_directory_exists, validate_directory_exists, validate_file_exists};
pub use time_format::format_duration;
pub use video_scanner::{VIDEO_EXTENSIONS, is_video_file, scan_video_files};
