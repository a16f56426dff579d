pub mod lookup;
pub mod service_info;
pub mod utils;
