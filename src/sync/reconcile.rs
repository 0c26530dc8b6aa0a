use crate::model::{Completable, Field};

/// Whether a server echo agrees with the document the client sent, on the
/// fields the client owns. Server-only bookkeeping (`dateCreated`, version
/// counters) is ignored; a disagreement on any editable field means the save
/// did not take. Dates compare at millisecond precision, the grain the
/// server stores, so an echo truncated below that is not a mismatch.
pub fn completables_match(sent: &Completable, echoed: &Completable) -> bool {
    sent.id == echoed.id
        && Field::ALL
            .iter()
            .all(|field| field.value_of(sent) == field.value_of(echoed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn utc(iso: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(iso).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn identical_documents_match() {
        let task = Completable::new("t1", "Milk");
        assert!(completables_match(&task, &task.clone()));
    }

    #[test]
    fn server_only_fields_are_ignored() {
        let sent = Completable::new("t1", "Milk");
        let mut echoed = sent.clone();
        echoed.date_created = Utc.with_ymd_and_hms(2020, 6, 20, 0, 0, 0).unwrap();
        assert!(completables_match(&sent, &echoed));
    }

    #[test]
    fn an_editable_field_disagreement_is_a_mismatch() {
        let sent = Completable::new("t1", "Milk");

        let mut echoed = sent.clone();
        echoed.completed = true;
        assert!(!completables_match(&sent, &echoed));

        let mut echoed = sent.clone();
        echoed.title = "Milk!".into();
        assert!(!completables_match(&sent, &echoed));

        let mut echoed = sent.clone();
        echoed.prereq_tasks.push("t9".into());
        assert!(!completables_match(&sent, &echoed));
    }

    #[test]
    fn different_identity_never_matches() {
        let sent = Completable::new("t1", "Milk");
        let echoed = Completable::new("t2", "Milk");
        assert!(!completables_match(&sent, &echoed));
    }

    #[test]
    fn dates_compare_at_millisecond_precision() {
        let mut sent = Completable::new("t1", "Milk");
        sent.completed_date = Some(utc("2020-06-25T10:00:00.123456789Z"));

        // the stored document keeps milliseconds only
        let mut echoed = sent.clone();
        echoed.completed_date = Some(utc("2020-06-25T10:00:00.123Z"));
        assert!(completables_match(&sent, &echoed));

        // a real millisecond disagreement still fails
        echoed.completed_date = Some(utc("2020-06-25T10:00:00.124Z"));
        assert!(!completables_match(&sent, &echoed));
    }

    #[test]
    fn echo_with_omitted_completed_parses_as_false() {
        // an old stored document echoed without the field
        let echoed: Completable = serde_json::from_value(serde_json::json!({
            "_id": "t1",
            "title": "Milk"
        }))
        .unwrap();
        assert!(!echoed.completed);

        let mut sent = Completable::new("t1", "Milk");
        sent.date_created = echoed.date_created;
        assert!(completables_match(&sent, &echoed));
    }
}
