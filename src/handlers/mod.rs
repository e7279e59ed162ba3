//! Handler modules, one per resource family of the support API

pub mod admin;
pub mod configs;
pub mod faqs;
pub mod images;
pub mod messages;
pub mod metrics;
pub mod stats;
pub mod tickets;
pub mod uploads;

// Re-export handler functions for convenience
pub use admin::{handle_login, handle_reset_password};
pub use configs::{ConfigEditor, branding_logos, fetch_config_map, handle_upload_config_asset, is_image_config};
pub use faqs::{FaqEditor, handle_delete_faq, handle_faq_answer, handle_faq_categories};
pub use images::{
    handle_active_images, handle_create_image, handle_delete_image, handle_image_categories, handle_list_images,
    handle_update_image,
};
pub use messages::ChatSession;
pub use metrics::{daily_status, handle_ticket_metrics};
pub use stats::{Period, bucket_by_status, monthly_status_chart};
pub use tickets::{
    fetch_all_tickets, find_ticket, handle_delete_ticket, handle_list_tickets, handle_recent_tickets,
    handle_update_status,
};
pub use uploads::LocalFile;
