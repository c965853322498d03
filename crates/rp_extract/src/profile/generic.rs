use super::{Field, SourceProfile};

const TITLE: &[Field] = &[
    Field::attr("meta[property=\"og:title\"]", "content"),
    Field::text("article h1"),
    Field::text("h1"),
    Field::text("title"),
];

const AUTHOR: &[Field] = &[
    Field::attr("meta[name=\"author\"]", "content"),
    Field::attr("meta[property=\"article:author\"]", "content"),
    Field::text("[rel=\"author\"]"),
];

const PUBLISH_TIME: &[Field] = &[
    Field::attr("meta[property=\"article:published_time\"]", "content"),
    Field::attr("time[datetime]", "datetime"),
    Field::text("time"),
];

const COVER: &[Field] = &[Field::attr("meta[property=\"og:image\"]", "content")];

const CONTENT: &[&str] = &["article", "main", "[role=\"main\"]"];

/// Any page without a dedicated profile.
#[derive(Debug, Clone, Default)]
pub struct GenericProfile;

impl GenericProfile {
    pub fn new() -> Self {
        Self
    }
}

impl SourceProfile for GenericProfile {
    fn name(&self) -> &str {
        "generic"
    }

    fn can_handle(&self, _url: &str) -> bool {
        true
    }

    fn title_fields(&self) -> &[Field] {
        TITLE
    }

    fn author_fields(&self) -> &[Field] {
        AUTHOR
    }

    fn publish_time_fields(&self) -> &[Field] {
        PUBLISH_TIME
    }

    fn cover_fields(&self) -> &[Field] {
        COVER
    }

    fn content_selectors(&self) -> &[&'static str] {
        CONTENT
    }

    fn tracking_selectors(&self) -> &[&'static str] {
        &["nav", "aside", "footer"]
    }

    fn cli_names(&self) -> Vec<&str> {
        vec!["generic", "web"]
    }
}
