use chrono::Utc;

use super::{TrackerConverter, format_opt, instant, username};
use crate::domain::Note;
use crate::identifier::CodeGenerator;
use crate::model::TrackedEntityComment;
use crate::preheat::TrackerPreheat;

/// Converts notes to comments and back.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotesConverter;

impl NotesConverter {
    /// Appends new, non-empty notes to `comments`.
    ///
    /// Comments are never edited: notes whose UID is already present are
    /// ignored.
    pub fn append(
        &self,
        preheat: &TrackerPreheat,
        comments: &mut Vec<TrackedEntityComment>,
        notes: &[Note],
    ) {
        for note in notes {
            if note.value.as_deref().is_none_or(str::is_empty) {
                continue;
            }
            let known = note
                .note
                .as_deref()
                .is_some_and(|uid| comments.iter().any(|c| c.uid == uid));
            if !known {
                comments.push(self.from(preheat, note));
            }
        }
    }
}

impl TrackerConverter for NotesConverter {
    type Dto = Note;
    type Domain = TrackedEntityComment;

    fn to(&self, comment: &TrackedEntityComment) -> Note {
        Note {
            note: Some(comment.uid.clone()),
            value: Some(comment.comment_text.clone()),
            stored_by: comment.creator.clone(),
            stored_at: format_opt(Some(&comment.created)),
        }
    }

    fn from(&self, preheat: &TrackerPreheat, note: &Note) -> TrackedEntityComment {
        TrackedEntityComment {
            uid: note
                .note
                .clone()
                .filter(|uid| !uid.is_empty())
                .unwrap_or_else(CodeGenerator::generate_uid),
            comment_text: note.value.clone().unwrap_or_default(),
            creator: note.stored_by.clone().or_else(|| username(preheat)),
            created: instant(note.stored_at.as_ref()).unwrap_or_else(Utc::now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_skips_empty_and_known_notes() {
        let preheat = TrackerPreheat::default();
        let mut comments = Vec::new();
        let notes = vec![
            Note {
                note: Some("KoObYFIvCpY".to_string()),
                value: Some("first visit".to_string()),
                ..Default::default()
            },
            Note {
                value: Some(String::new()),
                ..Default::default()
            },
        ];
        NotesConverter.append(&preheat, &mut comments, &notes);
        NotesConverter.append(&preheat, &mut comments, &notes);
        assert_eq!(comments.len(), 1);
        assert_eq!(NotesConverter.to(&comments[0]).value.as_deref(), Some("first visit"));
    }
}
