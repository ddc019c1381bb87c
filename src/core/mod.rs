pub mod activity;
pub mod config;
pub mod feed;
pub mod layout;
pub mod render;
pub mod scrobble;

use std::collections::BTreeMap;

use activity::ActivityService;
use config::ConfigService;
use feed::FeedService;
use layout::LayoutService;
use render::RenderService;
use scrobble::ScrobbleService;

#[derive(Debug, Clone, Default)]
pub struct AppServices {
    config: ConfigService,
    feed: FeedService,
    render: RenderService,
    scrobble: ScrobbleService,
    layout: LayoutService,
    activity: ActivityService,
}

impl AppServices {
    pub fn health_report(&self) -> BTreeMap<String, String> {
        let mut report = BTreeMap::new();
        report.insert(
            self.config.name().to_string(),
            self.config.status().to_string(),
        );
        report.insert(self.feed.name().to_string(), self.feed.status().to_string());
        report.insert(
            self.render.name().to_string(),
            self.render.status().to_string(),
        );
        report.insert(
            self.scrobble.name().to_string(),
            self.scrobble.status().to_string(),
        );
        report.insert(
            self.layout.name().to_string(),
            self.layout.status().to_string(),
        );
        report.insert(
            self.activity.name().to_string(),
            self.activity.status().to_string(),
        );
        report
    }
}
