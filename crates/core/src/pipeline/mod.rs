pub mod capture_export_use_case;
pub mod estimation_loop;
pub mod pipeline_logger;
pub mod resource_manager;
