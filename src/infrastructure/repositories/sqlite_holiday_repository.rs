use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

use crate::domain::entities::Holiday;
use crate::domain::repositories::HolidayRepository;
use crate::error::CoreResult;

pub struct SqliteHolidayRepository {
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl SqliteHolidayRepository {
    pub fn new(conn: Arc<Mutex<rusqlite::Connection>>) -> Self {
        Self { conn }
    }

    fn row_to_holiday(row: &rusqlite::Row) -> rusqlite::Result<Holiday> {
        let date_str: String = row.get(0)?;
        let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").unwrap_or_default();
        Ok(Holiday {
            date,
            name: row.get(1)?,
            is_custom: row.get::<_, i64>(2)? != 0,
        })
    }
}

impl HolidayRepository for SqliteHolidayRepository {
    fn insert(&self, holiday: &Holiday) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO holidays (date, name, is_custom) VALUES (?1, ?2, ?3)
             ON CONFLICT(date) DO UPDATE SET name = excluded.name, is_custom = excluded.is_custom",
            params![
                holiday.date.format("%Y-%m-%d").to_string(),
                holiday.name,
                holiday.is_custom as i64
            ],
        )?;
        Ok(())
    }

    fn delete(&self, date: NaiveDate) -> CoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM holidays WHERE date = ?1",
            params![date.format("%Y-%m-%d").to_string()],
        )?;
        Ok(())
    }

    fn get_by_date(&self, date: NaiveDate) -> CoreResult<Option<Holiday>> {
        let conn = self.conn.lock().unwrap();
        let holiday = conn
            .query_row(
                "SELECT date, name, is_custom FROM holidays WHERE date = ?1",
                params![date.format("%Y-%m-%d").to_string()],
                Self::row_to_holiday,
            )
            .optional()?;
        Ok(holiday)
    }

    fn is_holiday(&self, date: NaiveDate) -> CoreResult<bool> {
        Ok(self.get_by_date(date)?.is_some())
    }

    fn list_range(&self, from: NaiveDate, to: NaiveDate) -> CoreResult<Vec<Holiday>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT date, name, is_custom FROM holidays WHERE date >= ?1 AND date <= ?2 ORDER BY date",
        )?;
        let rows = stmt.query_map(
            params![from.format("%Y-%m-%d").to_string(), to.format("%Y-%m-%d").to_string()],
            Self::row_to_holiday,
        )?;
        let mut holidays = Vec::new();
        for row in rows {
            holidays.push(row?);
        }
        Ok(holidays)
    }
}
