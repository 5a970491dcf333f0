/// Table-level planner statistics from `pg_class`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TupleStatistic {
    pub oid: u32,
    pub schema: String,
    pub table: String,
    pub rel_pages: i32,
    pub rel_tuples: f32,
}

/// One `pg_statistic` row with its slot arrays already rendered as SQL
/// literals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeStatistic {
    pub oid: u32,
    pub schema: String,
    pub table: String,
    pub attname: String,
    pub type_name: String,
    pub relid: u32,
    pub attnum: i16,
    pub inherit: bool,
    pub null_fraction: f32,
    pub width: i32,
    pub distinct: f32,

    /// `stakind1` .. `stakind5`
    pub kinds: [i16; 5],

    /// `staop1` .. `staop5`
    pub operators: [u32; 5],

    /// `stacoll1` .. `stacoll5`, empty on servers without per-slot
    /// collations.
    pub collations: Vec<u32>,

    /// `stanumbers1` .. `stanumbers5` as array literals, `NULL` when unset.
    pub numbers: [String; 5],

    /// `stavalues1` .. `stavalues5` as array literals, `NULL` when unset.
    pub values: [String; 5],
}
