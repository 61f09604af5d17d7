#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Meter {
    pub id: i64,
    pub name: String,
    pub unit: String,
}

impl Meter {
    pub const MAX_NAME_LEN: usize = 30;
    pub const MAX_UNIT_LEN: usize = 10;
}

impl std::fmt::Display for Meter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "meter {} ({})", self.name, self.unit)
    }
}
