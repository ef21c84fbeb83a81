use super::rows::OfflineEntryRow;
use crate::domain::entities::{EntryFieldData, PendingAction};
use crate::domain::value_objects::{EntryAction, EntryId};
use crate::shared::error::AppError;

pub fn pending_action_from_row(row: OfflineEntryRow) -> Result<PendingAction, AppError> {
    let action = row
        .action
        .parse::<EntryAction>()
        .map_err(AppError::DeserializationError)?;
    let fields: Vec<EntryFieldData> = if row.fields.trim().is_empty() {
        Vec::new()
    } else {
        serde_json::from_str(&row.fields)?
    };

    Ok(PendingAction {
        database_id: row.dataid,
        course_id: row.courseid,
        group_id: row.groupid,
        action,
        entry_id: EntryId::new(row.entryid),
        fields,
        time_modified: row.timemodified,
    })
}

pub fn fields_to_column(fields: &[EntryFieldData]) -> Result<String, AppError> {
    serde_json::to_string(fields).map_err(|e| AppError::SerializationError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_maps_to_pending_action() {
        let row = OfflineEntryRow {
            dataid: 1,
            courseid: 2,
            groupid: None,
            action: "add".to_string(),
            entryid: -1000,
            fields: r#"[{"fieldid":5,"value":"\"hello\""}]"#.to_string(),
            timemodified: 1000,
        };
        let action = pending_action_from_row(row).unwrap();
        assert_eq!(action.action, EntryAction::Add);
        assert_eq!(action.entry_id, EntryId::new(-1000));
        assert_eq!(action.fields[0].value, "\"hello\"");
        assert_eq!(action.fields[0].subfield, "");
    }

    #[test]
    fn unknown_action_is_rejected() {
        let row = OfflineEntryRow {
            dataid: 1,
            courseid: 2,
            groupid: None,
            action: "publish".to_string(),
            entryid: 3,
            fields: "[]".to_string(),
            timemodified: 1,
        };
        assert!(matches!(
            pending_action_from_row(row),
            Err(AppError::DeserializationError(_))
        ));
    }
}
