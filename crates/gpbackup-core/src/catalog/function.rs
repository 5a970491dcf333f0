use super::{class, make_fqn, UniqueId};

/// A function or stored procedure.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub oid: u32,
    pub schema: String,
    pub name: String,

    /// Argument list with names and defaults, as in `pg_get_function_arguments`.
    pub arguments: String,

    /// Argument list as accepted by `ALTER FUNCTION`.
    pub ident_args: String,

    /// `None` for stored procedures.
    pub result_type: Option<String>,

    pub returns_set: bool,
    pub language: String,
    pub body: String,

    /// Shared library path for C functions. `-` and empty both mean none.
    pub binary_path: String,

    pub volatility: Volatility,
    pub parallel: Parallel,
    pub exec_location: FunctionExecLocation,
    pub data_access: Option<DataAccess>,
    pub is_strict: bool,
    pub is_leakproof: bool,
    pub is_security_definer: bool,
    pub is_window: bool,
    pub cost: f32,
    pub rows: f32,

    /// One `name=value` per entry of `proconfig`.
    pub config: Vec<String>,

    /// Already formatted `FOR TYPE ...` list.
    pub transform_types: String,

    /// Planner support function. `-` and empty both mean none.
    pub planner_support: String,

    pub depends_upon: Vec<UniqueId>,
}

impl Default for Function {
    fn default() -> Function {
        Function {
            oid: 0,
            schema: String::new(),
            name: String::new(),
            arguments: String::new(),
            ident_args: String::new(),
            result_type: Some("void".to_string()),
            returns_set: false,
            language: "sql".to_string(),
            body: String::new(),
            binary_path: String::new(),
            volatility: Volatility::Volatile,
            parallel: Parallel::Unsafe,
            exec_location: FunctionExecLocation::Any,
            data_access: None,
            is_strict: false,
            is_leakproof: false,
            is_security_definer: false,
            is_window: false,
            cost: 100.0,
            rows: 0.0,
            config: vec![],
            transform_types: String::new(),
            planner_support: String::new(),
            depends_upon: vec![],
        }
    }
}

impl Function {
    /// Name plus arguments, which tells overloads apart.
    pub fn fqn(&self) -> String {
        format!("{}({})", make_fqn(&self.schema, &self.name), self.arguments)
    }

    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_PROC, self.oid)
    }

    pub fn is_procedure(&self) -> bool {
        self.result_type.is_none()
    }

    pub fn object_type(&self) -> &'static str {
        if self.is_procedure() {
            "PROCEDURE"
        } else {
            "FUNCTION"
        }
    }

    /// The server default for `COST`, which is not printed.
    pub fn default_cost(&self) -> f32 {
        if self.language == "c" || self.language == "internal" {
            1.0
        } else {
            100.0
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Volatility {
    Immutable,
    Stable,
    #[default]
    Volatile,
}

impl Volatility {
    pub fn from_code(code: &str) -> Volatility {
        match code {
            "i" => Volatility::Immutable,
            "s" => Volatility::Stable,
            _ => Volatility::Volatile,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Parallel {
    Safe,
    Restricted,
    #[default]
    Unsafe,
}

impl Parallel {
    pub fn from_code(code: &str) -> Parallel {
        match code {
            "s" => Parallel::Safe,
            "r" => Parallel::Restricted,
            _ => Parallel::Unsafe,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Parallel::Safe => "SAFE",
            Parallel::Restricted => "RESTRICTED",
            Parallel::Unsafe => "UNSAFE",
        }
    }
}

/// Where a function body runs in the cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FunctionExecLocation {
    #[default]
    Any,
    Coordinator,
    AllSegments,
    InitPlan,
}

impl FunctionExecLocation {
    pub fn from_code(code: &str) -> FunctionExecLocation {
        match code {
            "m" | "c" => FunctionExecLocation::Coordinator,
            "s" => FunctionExecLocation::AllSegments,
            "i" => FunctionExecLocation::InitPlan,
            _ => FunctionExecLocation::Any,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataAccess {
    ContainsSql,
    ModifiesSqlData,
    NoSql,
    ReadsSqlData,
}

impl DataAccess {
    pub fn from_code(code: &str) -> Option<DataAccess> {
        match code {
            "c" => Some(DataAccess::ContainsSql),
            "m" => Some(DataAccess::ModifiesSqlData),
            "n" => Some(DataAccess::NoSql),
            "r" => Some(DataAccess::ReadsSqlData),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            DataAccess::ContainsSql => "CONTAINS SQL",
            DataAccess::ModifiesSqlData => "MODIFIES SQL DATA",
            DataAccess::NoSql => "NO SQL",
            DataAccess::ReadsSqlData => "READS SQL DATA",
        }
    }
}

/// Name and arguments of a function referenced by oid from another object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionRef {
    pub oid: u32,

    /// `schema.name`, quoted.
    pub qualified_name: String,

    pub arguments: String,

    pub is_internal: bool,
}

impl FunctionRef {
    pub fn fqn(&self) -> String {
        format!("{}({})", self.qualified_name, self.arguments)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AggregateKind {
    #[default]
    Normal,
    OrderedSet,
    Hypothetical,
}

impl AggregateKind {
    pub fn from_code(code: &str) -> AggregateKind {
        match code {
            "o" => AggregateKind::OrderedSet,
            "h" => AggregateKind::Hypothetical,
            _ => AggregateKind::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalModify {
    ReadOnly,
    Shareable,
    ReadWrite,
}

impl FinalModify {
    pub fn from_code(code: &str) -> Option<FinalModify> {
        match code {
            "r" => Some(FinalModify::ReadOnly),
            "s" => Some(FinalModify::Shareable),
            "w" => Some(FinalModify::ReadWrite),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            FinalModify::ReadOnly => "READ_ONLY",
            FinalModify::Shareable => "SHAREABLE",
            FinalModify::ReadWrite => "READ_WRITE",
        }
    }
}

/// A user-defined aggregate. Support functions are resolved to names by the
/// catalog layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregate {
    pub oid: u32,
    pub schema: String,
    pub name: String,
    pub arguments: String,
    pub ident_args: String,
    pub transition_function: Option<FunctionRef>,
    pub preliminary_function: Option<FunctionRef>,
    pub combine_function: Option<FunctionRef>,
    pub serial_function: Option<FunctionRef>,
    pub deserial_function: Option<FunctionRef>,
    pub final_function: Option<FunctionRef>,
    pub final_func_extra: bool,
    pub transition_type: String,
    pub transition_space: i32,
    pub initial_value: Option<String>,

    /// Quoted `schema."op"` sort operator.
    pub sort_operator: String,

    pub kind: AggregateKind,
    pub is_ordered: bool,
    pub final_modify: Option<FinalModify>,
    pub m_transition_function: Option<FunctionRef>,
    pub m_inverse_transition_function: Option<FunctionRef>,
    pub m_transition_type: String,
    pub m_transition_space: i32,
    pub m_final_function: Option<FunctionRef>,
    pub m_final_func_extra: bool,
    pub m_initial_value: Option<String>,
    pub m_final_modify: Option<FinalModify>,
    pub parallel: Option<Parallel>,
    pub depends_upon: Vec<UniqueId>,
}

impl Aggregate {
    pub fn fqn(&self) -> String {
        format!("{}({})", make_fqn(&self.schema, &self.name), self.ident_args)
    }

    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_AGGREGATE, self.oid)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CastMethod {
    #[default]
    Function,
    InOut,
    Binary,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CastContext {
    #[default]
    Explicit,
    Assignment,
    Implicit,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cast {
    pub oid: u32,
    pub source_type: String,
    pub target_type: String,
    pub method: CastMethod,
    pub context: CastContext,

    /// Set when `method` is [`CastMethod::Function`].
    pub function: Option<FunctionRef>,
}

impl Cast {
    pub fn fqn(&self) -> String {
        format!("({} AS {})", self.source_type, self.target_type)
    }

    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_CAST, self.oid)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extension {
    pub oid: u32,
    pub name: String,
    pub schema: String,
}

impl Extension {
    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_EXTENSION, self.oid)
    }
}

/// A procedural language and its support functions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Language {
    pub oid: u32,
    pub name: String,
    pub owner: String,
    pub is_pl: bool,
    pub trusted: bool,
    pub handler: Option<FunctionRef>,
    pub inline: Option<FunctionRef>,
    pub validator: Option<FunctionRef>,
}

impl Language {
    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_LANGUAGE, self.oid)
    }

    pub fn support_function_oids(&self) -> impl Iterator<Item = u32> + '_ {
        [&self.handler, &self.inline, &self.validator]
            .into_iter()
            .flatten()
            .map(|f| f.oid)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transform {
    pub oid: u32,
    pub type_schema: String,
    pub type_name: String,
    pub language: String,
    pub from_sql: Option<FunctionRef>,
    pub to_sql: Option<FunctionRef>,
}

impl Transform {
    pub fn type_fqn(&self) -> String {
        format!("{}.{}", self.type_schema, self.type_name)
    }

    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_TRANSFORM, self.oid)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversion {
    pub oid: u32,
    pub schema: String,
    pub name: String,
    pub for_encoding: String,
    pub to_encoding: String,
    pub function: String,
    pub is_default: bool,
}

impl Conversion {
    pub fn fqn(&self) -> String {
        make_fqn(&self.schema, &self.name)
    }

    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(class::PG_CONVERSION, self.oid)
    }
}

/// Splits `functions` into those that implement a language (handler,
/// inline or validator) and all others, keeping relative order.
pub fn extract_language_functions(
    functions: Vec<Function>,
    languages: &[Language],
) -> (Vec<Function>, Vec<Function>) {
    let support: std::collections::HashSet<u32> = languages
        .iter()
        .flat_map(|lang| lang.support_function_oids())
        .collect();

    functions
        .into_iter()
        .partition(|function| support.contains(&function.oid))
}
