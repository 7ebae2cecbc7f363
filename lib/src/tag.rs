/// Legacy tag object (`{"#": "text"}`). Newer stories build tags at runtime
/// between `BeginTag`/`EndTag` commands instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    text: String,
}

impl Tag {
    pub fn new(text: &str) -> Self {
        Tag {
            text: text.to_string(),
        }
    }

    pub fn get_text(&self) -> &str {
        &self.text
    }
}
