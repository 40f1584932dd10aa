//! Review answer database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{Answer, AnswerPatch, NewAnswer};

fn answer_from_row(row: &Row<'_>) -> rusqlite::Result<Answer> {
    Ok(Answer {
        question_id: row.get(0)?,
        value: row.get(1)?,
        shared_with_patient: row.get(2)?,
        shared_with_doctor: row.get(3)?,
    })
}

impl Database {
    /// Insert the first answer for a question.
    ///
    /// Fails with [`DbError::Constraint`] when the question already has one.
    pub fn insert_answer(&self, review_id: &str, answer: &NewAnswer) -> DbResult<Answer> {
        let now = chrono::Utc::now().to_rfc3339();
        let rows_affected = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO review_answers (
                review_id, question_id, value,
                shared_with_patient, shared_with_doctor, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
            params![
                review_id,
                answer.question_id,
                answer.value,
                answer.shared_with_patient,
                answer.shared_with_doctor,
                now,
            ],
        )?;
        if rows_affected == 0 {
            return Err(DbError::Constraint(format!(
                "answer exists for {}/{}",
                review_id, answer.question_id
            )));
        }
        Ok(Answer::from(answer.clone()))
    }

    /// Apply a partial update; fields left `None` keep their stored value.
    pub fn update_answer(
        &self,
        review_id: &str,
        question_id: &str,
        patch: &AnswerPatch,
    ) -> DbResult<Answer> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE review_answers SET
                value = COALESCE(?3, value),
                shared_with_patient = COALESCE(?4, shared_with_patient),
                shared_with_doctor = COALESCE(?5, shared_with_doctor),
                updated_at = ?6
            WHERE review_id = ?1 AND question_id = ?2
            "#,
            params![
                review_id,
                question_id,
                patch.value,
                patch.shared_with_patient,
                patch.shared_with_doctor,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        if rows_affected == 0 {
            return Err(DbError::NotFound(format!("{}/{}", review_id, question_id)));
        }
        self.get_answer(review_id, question_id)?
            .ok_or_else(|| DbError::NotFound(format!("{}/{}", review_id, question_id)))
    }

    /// Get one answer.
    pub fn get_answer(&self, review_id: &str, question_id: &str) -> DbResult<Option<Answer>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT question_id, value, shared_with_patient, shared_with_doctor
                FROM review_answers
                WHERE review_id = ?1 AND question_id = ?2
                "#,
                params![review_id, question_id],
                answer_from_row,
            )
            .optional()?)
    }

    /// List all answers of a review, ordered by question id.
    pub fn list_answers(&self, review_id: &str) -> DbResult<Vec<Answer>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT question_id, value, shared_with_patient, shared_with_doctor
            FROM review_answers
            WHERE review_id = ?
            ORDER BY question_id
            "#,
        )?;

        let rows = stmt.query_map([review_id], answer_from_row)?;

        let mut answers = Vec::new();
        for row in rows {
            answers.push(row?);
        }
        Ok(answers)
    }
}
