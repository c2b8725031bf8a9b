//! Presentation-side edit-mode state machine for the article detail view:
//! `viewing → editing → (saving → viewing | editing)`. Independent of the
//! synchronization core; a failed save returns to editing with the draft kept.
use crate::api::model::ArticlePatch;
use crate::model::Article;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EditorPhase {
    #[default]
    Viewing,
    Editing,
    Saving,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EditorError {
    #[error("no edit in progress")]
    NotEditing,
    #[error("an edit is already in progress")]
    AlreadyEditing,
    #[error("no save in progress")]
    NotSaving,
}

#[derive(Debug, Default)]
pub struct Editor {
    phase: EditorPhase,
    draft_title: String,
    draft_content: String,
}

impl Editor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> EditorPhase {
        self.phase
    }

    pub fn draft_title(&self) -> &str {
        &self.draft_title
    }

    pub fn draft_content(&self) -> &str {
        &self.draft_content
    }

    /// Snapshot the article's current text into the draft.
    pub fn begin(&mut self, article: &Article) -> Result<(), EditorError> {
        if self.phase() != EditorPhase::Viewing {
            return Err(EditorError::AlreadyEditing);
        }
        self.draft_title = article.title.clone().unwrap_or_default();
        self.draft_content = article.content.clone().unwrap_or_default();
        self.phase = EditorPhase::Editing;
        Ok(())
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> Result<(), EditorError> {
        if self.phase() != EditorPhase::Editing {
            return Err(EditorError::NotEditing);
        }
        self.draft_title = title.into();
        Ok(())
    }

    pub fn set_content(&mut self, content: impl Into<String>) -> Result<(), EditorError> {
        if self.phase() != EditorPhase::Editing {
            return Err(EditorError::NotEditing);
        }
        self.draft_content = content.into();
        Ok(())
    }

    /// Discard the draft and return to viewing.
    pub fn cancel(&mut self) -> Result<(), EditorError> {
        if self.phase() != EditorPhase::Editing {
            return Err(EditorError::NotEditing);
        }
        self.draft_title.clear();
        self.draft_content.clear();
        self.phase = EditorPhase::Viewing;
        Ok(())
    }

    /// Enter saving and hand back the draft as an update patch.
    pub fn start_save(&mut self) -> Result<ArticlePatch, EditorError> {
        if self.phase() != EditorPhase::Editing {
            return Err(EditorError::NotEditing);
        }
        self.phase = EditorPhase::Saving;
        Ok(ArticlePatch {
            title: Some(self.draft_title.clone()),
            content: Some(self.draft_content.clone()),
            ..Default::default()
        })
    }

    pub fn saved(&mut self) -> Result<(), EditorError> {
        if self.phase() != EditorPhase::Saving {
            return Err(EditorError::NotSaving);
        }
        self.draft_title.clear();
        self.draft_content.clear();
        self.phase = EditorPhase::Viewing;
        Ok(())
    }

    /// A failed save keeps the draft so nothing the user typed is lost.
    pub fn save_failed(&mut self) -> Result<(), EditorError> {
        if self.phase() != EditorPhase::Saving {
            return Err(EditorError::NotSaving);
        }
        self.phase = EditorPhase::Editing;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ArticleStatus;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn article() -> Article {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        Article {
            id: Uuid::new_v4(),
            category_id: Uuid::new_v4(),
            keyword: "keyword".into(),
            title: Some("Old title".into()),
            content: Some("Old content".into()),
            status: ArticleStatus::ReviewPending,
            wp_post_id: None,
            wp_url: None,
            wp_published_at: None,
            metadata: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn edit_save_cycle() {
        let mut editor = Editor::new();
        assert_eq!(editor.phase(), EditorPhase::Viewing);

        editor.begin(&article()).unwrap();
        assert_eq!(editor.draft_title(), "Old title");
        editor.set_title("New title").unwrap();
        editor.set_content("New content").unwrap();

        let patch = editor.start_save().unwrap();
        assert_eq!(editor.phase(), EditorPhase::Saving);
        assert_eq!(patch.title.as_deref(), Some("New title"));
        assert_eq!(patch.content.as_deref(), Some("New content"));
        assert!(patch.keyword.is_none());

        editor.saved().unwrap();
        assert_eq!(editor.phase(), EditorPhase::Viewing);
    }

    #[test]
    fn failed_save_keeps_draft() {
        let mut editor = Editor::new();
        editor.begin(&article()).unwrap();
        editor.set_content("Edited").unwrap();
        let _ = editor.start_save().unwrap();

        editor.save_failed().unwrap();
        assert_eq!(editor.phase(), EditorPhase::Editing);
        assert_eq!(editor.draft_content(), "Edited");
    }

    #[test]
    fn cancel_discards_draft() {
        let mut editor = Editor::new();
        editor.begin(&article()).unwrap();
        editor.set_title("Scrapped").unwrap();
        editor.cancel().unwrap();
        assert_eq!(editor.phase(), EditorPhase::Viewing);
        assert_eq!(editor.draft_title(), "");
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        let mut editor = Editor::new();
        assert_eq!(editor.cancel(), Err(EditorError::NotEditing));
        assert_eq!(editor.saved(), Err(EditorError::NotSaving));
        assert_eq!(editor.set_title("x"), Err(EditorError::NotEditing));

        editor.begin(&article()).unwrap();
        assert_eq!(editor.begin(&article()), Err(EditorError::AlreadyEditing));

        let _ = editor.start_save().unwrap();
        assert_eq!(editor.start_save(), Err(EditorError::NotEditing));
    }
}
