//! Form payloads for post creation and editing.

use serde::Deserialize;

use crate::domain::entities::GroupRecord;

/// Raw body of the post create/edit form. `group` carries the selected
/// group id as a string; the empty string means "no group".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostForm {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub image: String,
}

/// A validated draft ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

/// Field-level errors rendered back into the form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFormErrors {
    pub text: Option<&'static str>,
    pub group: Option<&'static str>,
}

impl PostFormErrors {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.group.is_none()
    }
}

impl PostForm {
    /// Validate against the known groups. Text must be non-blank; a group,
    /// when selected, must reference an existing group id.
    pub fn validate(&self, groups: &[GroupRecord]) -> Result<NewPost, PostFormErrors> {
        let mut errors = PostFormErrors::default();

        let text = self.text.trim();
        if text.is_empty() {
            errors.text = Some("Post text must not be empty");
        }

        let group_id = match self.group.trim() {
            "" => None,
            raw => match raw.parse::<i64>() {
                Ok(id) if groups.iter().any(|group| group.id == id) => Some(id),
                _ => {
                    errors.group = Some("Select one of the listed groups");
                    None
                }
            },
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        let image = match self.image.trim() {
            "" => None,
            path => Some(path.to_string()),
        };

        Ok(NewPost {
            text: text.to_string(),
            group_id,
            image,
        })
    }
}

/// Body of the comment form under a post detail page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}
