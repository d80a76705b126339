use chrono::NaiveDate;

use crate::domain::entities::Holiday;
use crate::error::CoreResult;

/// Stateless lens over the durable store's `holidays` table.
pub trait HolidayRepository: Send + Sync {
    fn insert(&self, holiday: &Holiday) -> CoreResult<()>;
    fn delete(&self, date: NaiveDate) -> CoreResult<()>;
    fn get_by_date(&self, date: NaiveDate) -> CoreResult<Option<Holiday>>;
    fn is_holiday(&self, date: NaiveDate) -> CoreResult<bool>;
    fn list_range(&self, from: NaiveDate, to: NaiveDate) -> CoreResult<Vec<Holiday>>;
}
