use crate::cache::EntityId;
use crate::error::{Error, ErrorKind};
use book_tracker_models::Category;
use exn::OptionExt;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CategoryRow {
    id: i32,
    // Nullable in the schema, but a category without a name cannot be looked up.
    name: Option<String>,
}
impl TryFrom<CategoryRow> for (EntityId, Category) {
    type Error = Error;
    fn try_from(row: CategoryRow) -> Result<Self, Self::Error> {
        let name = row.name.ok_or_raise(|| ErrorKind::InvalidData("category name"))?;
        Ok((EntityId(row.id), Category { name }))
    }
}
