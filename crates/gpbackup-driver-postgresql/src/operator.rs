use crate::{query::RowExt, PostgreSQL};
use gpbackup_core::{
    catalog::{
        Operator, OperatorClass, OperatorClassFunction, OperatorClassOperator, OperatorFamily,
    },
    driver::Scope,
    filter::extension_filter_clause,
    version::DbVersion,
    Result,
};
use std::collections::HashMap;

pub(crate) fn operators_query(scope: &Scope) -> String {
    format!(
        "SELECT o.oid,
	quote_ident(n.nspname) AS schema,
	o.oprname AS name,
	quote_ident(pn.nspname) || '.' || quote_ident(p.proname) AS procedure,
	CASE WHEN o.oprleft = 0 THEN '-' ELSE pg_catalog.format_type(o.oprleft, NULL) END AS leftarg,
	CASE WHEN o.oprright = 0 THEN '-' ELSE pg_catalog.format_type(o.oprright, NULL) END AS rightarg,
	o.oprcom::regoper::text AS commutator,
	o.oprnegate::regoper::text AS negator,
	o.oprrest::regproc::text AS restrict,
	o.oprjoin::regproc::text AS join,
	o.oprcanhash,
	o.oprcanmerge
FROM pg_operator o
JOIN pg_namespace n ON o.oprnamespace = n.oid
JOIN pg_proc p ON o.oprcode = p.oid
JOIN pg_namespace pn ON p.pronamespace = pn.oid
WHERE {}
AND {}
ORDER BY n.nspname, o.oprname, o.oid",
        scope.schema_clause("n"),
        extension_filter_clause("o"),
    )
}

pub(crate) async fn operators(db: &PostgreSQL, scope: &Scope) -> Result<Vec<Operator>> {
    db.query(&operators_query(scope))
        .await?
        .iter()
        .map(|row| {
            Ok(Operator {
                oid: row.oid("oid")?,
                schema: row.text("schema")?,
                name: row.text("name")?,
                procedure: row.text("procedure")?,
                left_arg: row.text("leftarg")?,
                right_arg: row.text("rightarg")?,
                commutator: row.text("commutator")?,
                negator: row.text("negator")?,
                restrict: row.text("restrict")?,
                join: row.text("join")?,
                can_hash: row.flag("oprcanhash")?,
                can_merge: row.flag("oprcanmerge")?,
            })
        })
        .collect()
}

pub(crate) async fn operator_families(
    db: &PostgreSQL,
    scope: &Scope,
) -> Result<Vec<OperatorFamily>> {
    let sql = format!(
        "SELECT f.oid,
	quote_ident(n.nspname) AS schema,
	quote_ident(f.opfname) AS name,
	quote_ident(am.amname) AS indexmethod
FROM pg_opfamily f
JOIN pg_namespace n ON f.opfnamespace = n.oid
JOIN pg_am am ON f.opfmethod = am.oid
WHERE {}
AND {}
ORDER BY n.nspname, f.opfname",
        scope.schema_clause("n"),
        extension_filter_clause("f"),
    );
    db.query(&sql)
        .await?
        .iter()
        .map(|row| {
            Ok(OperatorFamily {
                oid: row.oid("oid")?,
                schema: row.text("schema")?,
                name: row.text("name")?,
                index_method: row.text("indexmethod")?,
            })
        })
        .collect()
}

pub(crate) fn class_operators_query(version: &DbVersion) -> String {
    let (recheck, order_by) = if version.at_least("6") {
        (
            "false",
            "CASE WHEN a.amoppurpose = 'o' THEN quote_ident(sn.nspname) || '.' || quote_ident(sf.opfname) ELSE '' END",
        )
    } else {
        ("a.amopreqcheck", "''")
    };
    let sort_family_join = if version.at_least("6") {
        "LEFT JOIN pg_opfamily sf ON a.amopsortfamily = sf.oid
LEFT JOIN pg_namespace sn ON sf.opfnamespace = sn.oid"
    } else {
        ""
    };
    format!(
        "SELECT d.refobjid AS classoid,
	a.amopstrategy::int AS strategynumber,
	a.amopopr::regoperator::text AS operator,
	{recheck} AS recheck,
	{order_by} AS orderbyfamily
FROM pg_amop a
JOIN pg_depend d ON d.objid = a.oid AND d.classid = 'pg_amop'::regclass AND d.refclassid = 'pg_opclass'::regclass
{sort_family_join}
ORDER BY d.refobjid, a.amopstrategy"
    )
}

const CLASS_FUNCTIONS_QUERY: &str = "SELECT d.refobjid AS classoid,
	p.amprocnum::int AS supportnumber,
	CASE WHEN p.amproclefttype = c.opcintype AND p.amprocrighttype = c.opcintype THEN '' ELSE pg_catalog.format_type(p.amproclefttype, NULL) END AS lefttype,
	CASE WHEN p.amproclefttype = c.opcintype AND p.amprocrighttype = c.opcintype THEN '' ELSE pg_catalog.format_type(p.amprocrighttype, NULL) END AS righttype,
	p.amproc::regprocedure::text AS function
FROM pg_amproc p
JOIN pg_depend d ON d.objid = p.oid AND d.classid = 'pg_amproc'::regclass AND d.refclassid = 'pg_opclass'::regclass
JOIN pg_opclass c ON d.refobjid = c.oid
ORDER BY d.refobjid, p.amprocnum";

pub(crate) async fn operator_classes(db: &PostgreSQL, scope: &Scope) -> Result<Vec<OperatorClass>> {
    let mut operators: HashMap<u32, Vec<OperatorClassOperator>> = HashMap::new();
    for row in db.query(&class_operators_query(&db.version)).await? {
        operators
            .entry(row.oid("classoid")?)
            .or_default()
            .push(OperatorClassOperator {
                strategy_number: row.int("strategynumber")?,
                operator: row.text("operator")?,
                recheck: row.flag("recheck")?,
                order_by_family: row.text("orderbyfamily")?,
            });
    }

    let mut functions: HashMap<u32, Vec<OperatorClassFunction>> = HashMap::new();
    for row in db.query(CLASS_FUNCTIONS_QUERY).await? {
        functions
            .entry(row.oid("classoid")?)
            .or_default()
            .push(OperatorClassFunction {
                support_number: row.int("supportnumber")?,
                left_type: row.text("lefttype")?,
                right_type: row.text("righttype")?,
                function_name: row.text("function")?,
            });
    }

    let sql = format!(
        "SELECT c.oid,
	quote_ident(n.nspname) AS schema,
	quote_ident(c.opcname) AS name,
	coalesce(quote_ident(fn.nspname), '') AS familyschema,
	coalesce(quote_ident(f.opfname), '') AS familyname,
	quote_ident(am.amname) AS indexmethod,
	pg_catalog.format_type(c.opcintype, NULL) AS type,
	c.opcdefault,
	CASE WHEN c.opckeytype = 0 THEN '-' ELSE pg_catalog.format_type(c.opckeytype, NULL) END AS storagetype
FROM pg_opclass c
JOIN pg_namespace n ON c.opcnamespace = n.oid
JOIN pg_am am ON c.opcmethod = am.oid
LEFT JOIN pg_opfamily f ON c.opcfamily = f.oid
LEFT JOIN pg_namespace fn ON f.opfnamespace = fn.oid
WHERE {}
AND {}
ORDER BY n.nspname, c.opcname",
        scope.schema_clause("n"),
        extension_filter_clause("c"),
    );
    db.query(&sql)
        .await?
        .iter()
        .map(|row| {
            let oid = row.oid("oid")?;
            Ok(OperatorClass {
                oid,
                schema: row.text("schema")?,
                name: row.text("name")?,
                family_schema: row.text("familyschema")?,
                family_name: row.text("familyname")?,
                index_method: row.text("indexmethod")?,
                ty: row.text("type")?,
                is_default: row.flag("opcdefault")?,
                storage_type: row.text("storagetype")?,
                operators: operators.remove(&oid).unwrap_or_default(),
                functions: functions.remove(&oid).unwrap_or_default(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recheck_only_before_6() {
        let v5 = class_operators_query(&DbVersion::from_release("5.28.0").unwrap());
        assert!(v5.contains("a.amopreqcheck AS recheck"));
        assert!(!v5.contains("amopsortfamily"));

        let v6 = class_operators_query(&DbVersion::from_release("6.20.0").unwrap());
        assert!(v6.contains("false AS recheck"));
        assert!(v6.contains("WHEN a.amoppurpose = 'o'"));
    }

    #[test]
    fn operators_are_filtered() {
        let sql = operators_query(&Scope::default());
        assert!(sql.contains("o.oid NOT IN (select objid from pg_depend where deptype = 'e')"));
        assert!(sql.contains("n.nspname NOT LIKE 'pg_temp_%'"));
    }
}
