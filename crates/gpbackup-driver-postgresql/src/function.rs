use crate::{
    query::{by_version, quote_setting, RowExt},
    PostgreSQL,
};
use gpbackup_core::{
    catalog::{
        make_fqn, Aggregate, AggregateKind, Cast, CastContext, CastMethod, Conversion, DataAccess,
        Extension, FinalModify, Function, FunctionExecLocation, FunctionRef, Language, Parallel,
        Transform, Volatility,
    },
    driver::Scope,
    filter::extension_filter_clause,
    version::DbVersion,
    Result,
};
use std::collections::HashMap;

pub(crate) async fn load_function_refs(db: &PostgreSQL) -> Result<HashMap<u32, FunctionRef>> {
    let sql = "SELECT p.oid,
	quote_ident(n.nspname) AS schema,
	quote_ident(p.proname) AS name,
	pg_catalog.pg_get_function_arguments(p.oid) AS arguments
FROM pg_proc p
LEFT JOIN pg_namespace n ON p.pronamespace = n.oid";

    let mut refs = HashMap::new();
    for row in db.query(sql).await? {
        let schema = row.text("schema")?;
        refs.insert(
            row.oid("oid")?,
            FunctionRef {
                oid: row.oid("oid")?,
                qualified_name: make_fqn(&schema, &row.text("name")?),
                arguments: row.text("arguments")?,
                is_internal: schema == "pg_catalog",
            },
        );
    }
    tracing::debug!(functions = refs.len(), "loaded function names");
    Ok(refs)
}

/// The function with oid `oid`, or `None` for the zero oid.
pub(crate) fn resolve(refs: &HashMap<u32, FunctionRef>, oid: u32) -> Option<FunctionRef> {
    if oid == 0 {
        return None;
    }
    let found = refs.get(&oid).cloned();
    if found.is_none() {
        tracing::warn!(oid, "function referenced by the catalog was not found");
    }
    found
}

pub(crate) fn functions_query(version: &DbVersion, scope: &Scope) -> String {
    let attributes = by_version(
        version,
        &[
            (
                "7",
                "p.prokind = 'w' AS proiswindow,
	proexeclocation::text AS proexeclocation,
	proleakproof,
	proparallel::text AS proparallel,
	CASE WHEN prosupport = 0 THEN '' ELSE prosupport::regproc::text END AS prosupport,
	coalesce(array_to_string(ARRAY(SELECT 'FOR TYPE ' || pg_catalog.format_type(t, NULL) FROM unnest(protrftypes) t), ', '), '') AS transformtypes,
	CASE WHEN p.prokind = 'p' THEN NULL ELSE pg_catalog.pg_get_function_result(p.oid) END AS resulttype,",
            ),
            (
                "6",
                "proiswindow,
	proexeclocation::text AS proexeclocation,
	proleakproof,
	'u' AS proparallel,
	'' AS prosupport,
	'' AS transformtypes,
	pg_catalog.pg_get_function_result(p.oid) AS resulttype,",
            ),
            (
                "",
                "false AS proiswindow,
	'a' AS proexeclocation,
	false AS proleakproof,
	'u' AS proparallel,
	'' AS prosupport,
	'' AS transformtypes,
	pg_catalog.pg_get_function_result(p.oid) AS resulttype,",
            ),
        ],
    );
    let not_aggregate = if version.at_least("7") {
        "p.prokind <> 'a'"
    } else {
        "p.proisagg = 'f'"
    };

    format!(
        "SELECT p.oid,
	quote_ident(n.nspname) AS schema,
	quote_ident(p.proname) AS name,
	p.proretset,
	coalesce(p.prosrc, '') AS body,
	coalesce(p.probin, '') AS binarypath,
	pg_catalog.pg_get_function_arguments(p.oid) AS arguments,
	pg_catalog.pg_get_function_identity_arguments(p.oid) AS identargs,
	p.provolatile::text AS provolatile,
	p.proisstrict,
	p.prosecdef,
	{attributes}
	ARRAY(SELECT option_name || '=' || option_value FROM pg_options_to_table(p.proconfig)) AS proconfig,
	p.procost,
	p.prorows,
	p.prodataaccess::text AS prodataaccess,
	(SELECT lanname FROM pg_catalog.pg_language WHERE oid = p.prolang)::text AS language
FROM pg_proc p
LEFT JOIN pg_namespace n ON p.pronamespace = n.oid
WHERE {}
AND {not_aggregate}
AND {}
ORDER BY n.nspname, p.proname, identargs",
        scope.schema_clause("n"),
        extension_filter_clause("p"),
    )
}

pub(crate) async fn functions(db: &PostgreSQL, scope: &Scope) -> Result<Vec<Function>> {
    db.query(&functions_query(&db.version, scope))
        .await?
        .iter()
        .map(|row| {
            Ok(Function {
                oid: row.oid("oid")?,
                schema: row.text("schema")?,
                name: row.text("name")?,
                arguments: row.text("arguments")?,
                ident_args: row.text("identargs")?,
                result_type: row.get_as("resulttype")?,
                returns_set: row.flag("proretset")?,
                language: row.text("language")?,
                body: row.text("body")?,
                binary_path: row.text("binarypath")?,
                volatility: Volatility::from_code(&row.text("provolatile")?),
                parallel: Parallel::from_code(&row.text("proparallel")?),
                exec_location: FunctionExecLocation::from_code(&row.text("proexeclocation")?),
                data_access: DataAccess::from_code(&row.text("prodataaccess")?),
                is_strict: row.flag("proisstrict")?,
                is_leakproof: row.flag("proleakproof")?,
                is_security_definer: row.flag("prosecdef")?,
                is_window: row.flag("proiswindow")?,
                cost: row.get_as::<Option<f32>>("procost")?.unwrap_or_default(),
                rows: row.get_as::<Option<f32>>("prorows")?.unwrap_or_default(),
                config: row.texts("proconfig")?.iter().map(|s| quote_setting(s)).collect(),
                transform_types: row.text("transformtypes")?,
                planner_support: row.text("prosupport")?,
                depends_upon: vec![],
            })
        })
        .collect()
}

pub(crate) fn aggregates_query(version: &DbVersion, scope: &Scope) -> String {
    let attributes = by_version(
        version,
        &[
            (
                "7",
                "a.aggcombinefn::regproc::oid AS aggcombinefn,
	a.aggserialfn::regproc::oid AS aggserialfn,
	a.aggdeserialfn::regproc::oid AS aggdeserialfn,
	0::oid AS aggprelimfn,
	a.aggfinalextra,
	a.aggkind::text AS aggkind,
	false AS aggordered,
	a.aggtransspace,
	a.aggmtransfn::regproc::oid AS aggmtransfn,
	a.aggminvtransfn::regproc::oid AS aggminvtransfn,
	a.aggmfinalfn::regproc::oid AS aggmfinalfn,
	a.aggmfinalextra,
	format_type(a.aggmtranstype, NULL) AS mtranstype,
	a.aggmtransspace,
	a.aggminitval,
	a.aggfinalmodify::text AS aggfinalmodify,
	a.aggmfinalmodify::text AS aggmfinalmodify,
	p.proparallel::text AS proparallel",
            ),
            (
                "6",
                "a.aggcombinefn::regproc::oid AS aggcombinefn,
	a.aggserialfn::regproc::oid AS aggserialfn,
	a.aggdeserialfn::regproc::oid AS aggdeserialfn,
	0::oid AS aggprelimfn,
	a.aggfinalextra,
	a.aggkind::text AS aggkind,
	false AS aggordered,
	a.aggtransspace,
	a.aggmtransfn::regproc::oid AS aggmtransfn,
	a.aggminvtransfn::regproc::oid AS aggminvtransfn,
	a.aggmfinalfn::regproc::oid AS aggmfinalfn,
	a.aggmfinalextra,
	format_type(a.aggmtranstype, NULL) AS mtranstype,
	a.aggmtransspace,
	a.aggminitval,
	'' AS aggfinalmodify,
	'' AS aggmfinalmodify,
	'' AS proparallel",
            ),
            (
                "",
                "0::oid AS aggcombinefn,
	0::oid AS aggserialfn,
	0::oid AS aggdeserialfn,
	a.aggprelimfn::regproc::oid AS aggprelimfn,
	false AS aggfinalextra,
	'n' AS aggkind,
	a.aggordered,
	0 AS aggtransspace,
	0::oid AS aggmtransfn,
	0::oid AS aggminvtransfn,
	0::oid AS aggmfinalfn,
	false AS aggmfinalextra,
	'' AS mtranstype,
	0 AS aggmtransspace,
	NULL::text AS aggminitval,
	'' AS aggfinalmodify,
	'' AS aggmfinalmodify,
	'' AS proparallel",
            ),
        ],
    );

    format!(
        "SELECT p.oid,
	quote_ident(n.nspname) AS schema,
	quote_ident(p.proname) AS name,
	pg_catalog.pg_get_function_arguments(p.oid) AS arguments,
	pg_catalog.pg_get_function_identity_arguments(p.oid) AS identargs,
	a.aggtransfn::regproc::oid AS aggtransfn,
	a.aggfinalfn::regproc::oid AS aggfinalfn,
	coalesce(quote_ident(opn.nspname) || '.' || o.oprname, '') AS sortop,
	format_type(a.aggtranstype, NULL) AS transtype,
	a.agginitval,
	{attributes}
FROM pg_aggregate a
LEFT JOIN pg_proc p ON a.aggfnoid = p.oid
LEFT JOIN pg_namespace n ON p.pronamespace = n.oid
LEFT JOIN pg_operator o ON a.aggsortop = o.oid
LEFT JOIN pg_namespace opn ON o.oprnamespace = opn.oid
WHERE {}
AND {}
ORDER BY p.oid",
        scope.schema_clause("n"),
        extension_filter_clause("p"),
    )
}

pub(crate) async fn aggregates(db: &PostgreSQL, scope: &Scope) -> Result<Vec<Aggregate>> {
    let rows = db.query(&aggregates_query(&db.version, scope)).await?;
    let refs = db.function_refs().await?;
    let function = |row: &tokio_postgres::Row, column: &str| -> Result<Option<FunctionRef>> {
        Ok(resolve(refs, row.oid(column)?))
    };

    rows.iter()
        .map(|row| {
            let mut m_transition_type = row.text("mtranstype")?;
            if m_transition_type == "-" {
                m_transition_type.clear();
            }
            let parallel = row.text("proparallel")?;
            Ok(Aggregate {
                oid: row.oid("oid")?,
                schema: row.text("schema")?,
                name: row.text("name")?,
                arguments: row.text("arguments")?,
                ident_args: row.text("identargs")?,
                transition_function: function(row, "aggtransfn")?,
                preliminary_function: function(row, "aggprelimfn")?,
                combine_function: function(row, "aggcombinefn")?,
                serial_function: function(row, "aggserialfn")?,
                deserial_function: function(row, "aggdeserialfn")?,
                final_function: function(row, "aggfinalfn")?,
                final_func_extra: row.flag("aggfinalextra")?,
                transition_type: row.text("transtype")?,
                transition_space: row.int("aggtransspace")?,
                initial_value: row.get_as("agginitval")?,
                sort_operator: row.text("sortop")?,
                kind: AggregateKind::from_code(&row.text("aggkind")?),
                is_ordered: row.flag("aggordered")?,
                final_modify: FinalModify::from_code(&row.text("aggfinalmodify")?),
                m_transition_function: function(row, "aggmtransfn")?,
                m_inverse_transition_function: function(row, "aggminvtransfn")?,
                m_transition_type,
                m_transition_space: row.int("aggmtransspace")?,
                m_final_function: function(row, "aggmfinalfn")?,
                m_final_func_extra: row.flag("aggmfinalextra")?,
                m_initial_value: row.get_as("aggminitval")?,
                m_final_modify: FinalModify::from_code(&row.text("aggmfinalmodify")?),
                parallel: (!parallel.is_empty()).then(|| Parallel::from_code(&parallel)),
                depends_upon: vec![],
            })
        })
        .collect()
}

pub(crate) fn casts_query(version: &DbVersion, scope: &Scope) -> String {
    let method = if version.at_least("6") {
        "c.castmethod::text AS castmethod"
    } else {
        "CASE WHEN c.castfunc = 0 THEN 'b' ELSE 'f' END AS castmethod"
    };
    format!(
        "SELECT c.oid,
	quote_ident(sn.nspname) || '.' || quote_ident(st.typname) AS source,
	quote_ident(tn.nspname) || '.' || quote_ident(tt.typname) AS target,
	c.castfunc AS function,
	{method},
	c.castcontext::text AS castcontext
FROM pg_cast c
JOIN pg_type st ON c.castsource = st.oid
JOIN pg_type tt ON c.casttarget = tt.oid
JOIN pg_namespace sn ON st.typnamespace = sn.oid
JOIN pg_namespace tn ON tt.typnamespace = tn.oid
LEFT JOIN pg_proc p ON c.castfunc = p.oid
LEFT JOIN pg_namespace n ON p.pronamespace = n.oid
WHERE (({}) OR ({}) OR ({}))
AND {}
ORDER BY 2, 3",
        scope.schema_clause("sn"),
        scope.schema_clause("tn"),
        scope.schema_clause("n"),
        extension_filter_clause("c"),
    )
}

pub(crate) async fn casts(db: &PostgreSQL, scope: &Scope) -> Result<Vec<Cast>> {
    let rows = db.query(&casts_query(&db.version, scope)).await?;
    let refs = db.function_refs().await?;
    rows.iter()
        .map(|row| {
            Ok(Cast {
                oid: row.oid("oid")?,
                source_type: row.text("source")?,
                target_type: row.text("target")?,
                method: match row.text("castmethod")?.as_str() {
                    "i" => CastMethod::InOut,
                    "b" => CastMethod::Binary,
                    _ => CastMethod::Function,
                },
                context: match row.text("castcontext")?.as_str() {
                    "a" => CastContext::Assignment,
                    "i" => CastContext::Implicit,
                    _ => CastContext::Explicit,
                },
                function: resolve(refs, row.oid("function")?),
            })
        })
        .collect()
}

pub(crate) async fn extensions(db: &PostgreSQL, _scope: &Scope) -> Result<Vec<Extension>> {
    let sql = "SELECT e.oid,
	quote_ident(e.extname) AS name,
	quote_ident(n.nspname) AS schema
FROM pg_extension e
JOIN pg_namespace n ON e.extnamespace = n.oid
ORDER BY e.oid";
    db.query(sql)
        .await?
        .iter()
        .map(|row| {
            Ok(Extension {
                oid: row.oid("oid")?,
                name: row.text("name")?,
                schema: row.text("schema")?,
            })
        })
        .collect()
}

pub(crate) async fn languages(db: &PostgreSQL, _scope: &Scope) -> Result<Vec<Language>> {
    let sql = format!(
        "SELECT l.oid,
	quote_ident(l.lanname) AS name,
	quote_ident(pg_get_userbyid(l.lanowner)) AS owner,
	l.lanispl,
	l.lanpltrusted,
	l.lanplcallfoid::regprocedure::oid AS handler,
	l.laninline::regprocedure::oid AS inline,
	l.lanvalidator::regprocedure::oid AS validator
FROM pg_language l
WHERE l.lanispl = 't'
AND l.lanname != 'plpgsql'
AND {}
ORDER BY l.oid",
        extension_filter_clause("l")
    );
    let rows = db.query(&sql).await?;
    let refs = db.function_refs().await?;
    rows.iter()
        .map(|row| {
            Ok(Language {
                oid: row.oid("oid")?,
                name: row.text("name")?,
                owner: row.text("owner")?,
                is_pl: row.flag("lanispl")?,
                trusted: row.flag("lanpltrusted")?,
                handler: resolve(refs, row.oid("handler")?),
                inline: resolve(refs, row.oid("inline")?),
                validator: resolve(refs, row.oid("validator")?),
            })
        })
        .collect()
}

pub(crate) async fn conversions(db: &PostgreSQL, scope: &Scope) -> Result<Vec<Conversion>> {
    let sql = format!(
        "SELECT c.oid,
	quote_ident(n.nspname) AS schema,
	quote_ident(c.conname) AS name,
	pg_encoding_to_char(c.conforencoding) AS forencoding,
	pg_encoding_to_char(c.contoencoding) AS toencoding,
	quote_ident(fn.nspname) || '.' || quote_ident(p.proname) AS function,
	c.condefault
FROM pg_conversion c
JOIN pg_namespace n ON c.connamespace = n.oid
JOIN pg_proc p ON c.conproc = p.oid
JOIN pg_namespace fn ON p.pronamespace = fn.oid
WHERE {}
AND {}
ORDER BY n.nspname, c.conname",
        scope.schema_clause("n"),
        extension_filter_clause("c"),
    );
    db.query(&sql)
        .await?
        .iter()
        .map(|row| {
            Ok(Conversion {
                oid: row.oid("oid")?,
                schema: row.text("schema")?,
                name: row.text("name")?,
                for_encoding: row.text("forencoding")?,
                to_encoding: row.text("toencoding")?,
                function: row.text("function")?,
                is_default: row.flag("condefault")?,
            })
        })
        .collect()
}

pub(crate) async fn transforms(db: &PostgreSQL, scope: &Scope) -> Result<Vec<Transform>> {
    if db.version.before("7") {
        return Ok(vec![]);
    }
    let sql = format!(
        "SELECT trf.oid,
	quote_ident(n.nspname) AS typeschema,
	quote_ident(t.typname) AS typename,
	quote_ident(l.lanname) AS language,
	trf.trffromsql::oid AS fromsql,
	trf.trftosql::oid AS tosql
FROM pg_transform trf
JOIN pg_type t ON trf.trftype = t.oid
JOIN pg_namespace n ON t.typnamespace = n.oid
JOIN pg_language l ON trf.trflang = l.oid
WHERE {}
AND {}
ORDER BY trf.oid",
        scope.schema_clause("n"),
        extension_filter_clause("trf"),
    );
    let rows = db.query(&sql).await?;
    let refs = db.function_refs().await?;
    rows.iter()
        .map(|row| {
            Ok(Transform {
                oid: row.oid("oid")?,
                type_schema: row.text("typeschema")?,
                type_name: row.text("typename")?,
                language: row.text("language")?,
                from_sql: resolve(refs, row.oid("fromsql")?),
                to_sql: resolve(refs, row.oid("tosql")?),
            })
        })
        .collect()
}
