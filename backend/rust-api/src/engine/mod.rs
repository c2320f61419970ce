//! Pure questionnaire rules: catalog, navigation, scoring, advice and draft
//! lifecycle timing. Nothing here touches storage or the network.

pub mod catalog;
pub mod lifecycle;
pub mod navigation;
pub mod pillar;
pub mod recommendations;
pub mod scoring;
