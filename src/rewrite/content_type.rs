/// Coarse classification of a response's `Content-Type`, used to decide
/// whether LDP masking applies and whether the body is worth logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCategory {
    Json,
    Text,
    Script,
    Style,
    Image,
    Other,
}

impl ContentCategory {
    /// Masking only ever touches text-shaped bodies; binary formats pass
    /// through untouched.
    pub fn is_maskable(&self) -> bool {
        matches!(
            self,
            ContentCategory::Json | ContentCategory::Text | ContentCategory::Script | ContentCategory::Style
        )
    }

    /// Whether an excerpt of this body is worth attaching to the access log.
    pub fn is_loggable(&self) -> bool {
        self.is_maskable()
    }
}

pub fn classify(content_type: Option<&str>) -> ContentCategory {
    let Some(content_type) = content_type else {
        return ContentCategory::Other;
    };
    let mime = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match mime.as_str() {
        "application/json" | "application/ld+json" | "application/problem+json" => ContentCategory::Json,
        "text/javascript" | "application/javascript" | "application/x-javascript" => ContentCategory::Script,
        "text/css" => ContentCategory::Style,
        _ if mime.starts_with("text/") => ContentCategory::Text,
        _ if mime.starts_with("image/") => ContentCategory::Image,
        _ => ContentCategory::Other,
    }
}
