pub mod admin;
pub mod answer;
pub mod assessment;
pub mod draft;
pub mod jobs;
pub mod question;
pub mod settings;
pub mod user;
