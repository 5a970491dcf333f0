use super::{Block, Fields, Printer};
use gpbackup_core::{
    catalog::{make_fqn, ObjectMetadata, Operator, OperatorClass, OperatorFamily},
    toc::MetadataEntry,
};

impl Printer<'_> {
    pub fn create_operator(&self, operator: &Operator, meta: &ObjectMetadata) -> Block {
        let procedure_keyword = if self.version.at_least("7") {
            "FUNCTION"
        } else {
            "PROCEDURE"
        };

        let mut fields = vec![format!("{procedure_keyword} = {}", operator.procedure)];
        if operator.left_arg != "-" {
            fields.push(format!("LEFTARG = {}", operator.left_arg));
        }
        if operator.right_arg != "-" {
            fields.push(format!("RIGHTARG = {}", operator.right_arg));
        }
        if operator.commutator != "0" {
            fields.push(format!("COMMUTATOR = OPERATOR({})", operator.commutator));
        }
        if operator.negator != "0" {
            fields.push(format!("NEGATOR = OPERATOR({})", operator.negator));
        }
        if operator.restrict != "-" {
            fields.push(format!("RESTRICT = {}", operator.restrict));
        }
        if operator.join != "-" {
            fields.push(format!("JOIN = {}", operator.join));
        }
        if operator.can_hash {
            fields.push("HASHES".to_string());
        }
        if operator.can_merge {
            fields.push("MERGES".to_string());
        }

        let fqn = operator.fqn();
        let mut sql = format!("\n\nCREATE OPERATOR {fqn} (\n\t{}\n);", Fields(&fields));

        // Operators are named by their argument types in ALTER statements
        let left = if operator.left_arg == "-" { "NONE" } else { operator.left_arg.as_str() };
        let right = if operator.right_arg == "-" { "NONE" } else { operator.right_arg.as_str() };
        let signature = format!("{fqn} ({left}, {right})");
        sql.push_str(&self.object_metadata(meta, &signature, "OPERATOR", None));

        Block::new(
            MetadataEntry::new(&operator.schema, &operator.name, "OPERATOR"),
            sql,
        )
    }

    pub fn create_operator_family(&self, family: &OperatorFamily, meta: &ObjectMetadata) -> Block {
        let fqn = family.fqn();
        let mut sql = format!("\n\nCREATE OPERATOR FAMILY {fqn};");
        sql.push_str(&self.object_metadata(meta, &fqn, "OPERATOR FAMILY", None));

        Block::new(
            MetadataEntry::new(&family.schema, &family.name, "OPERATOR FAMILY"),
            sql,
        )
    }

    pub fn create_operator_class(&self, class: &OperatorClass, meta: &ObjectMetadata) -> Block {
        let mut sql = format!(
            "\n\nCREATE OPERATOR CLASS {}",
            make_fqn(&class.schema, &class.name)
        );
        sql.push_str("\n\t");
        if class.is_default {
            sql.push_str("DEFAULT ");
        }
        fmt!(sql, "FOR TYPE {} USING {}", class.ty, class.index_method);
        // A class implicitly creates a family of the same name
        if !class.family_name.is_empty() && class.family_name != class.name {
            fmt!(
                sql,
                " FAMILY {}",
                make_fqn(&class.family_schema, &class.family_name)
            );
        }

        let mut clauses = vec![];
        for operator in &class.operators {
            let mut clause = format!("OPERATOR {} {}", operator.strategy_number, operator.operator);
            if operator.recheck {
                clause.push_str(" RECHECK");
            }
            if !operator.order_by_family.is_empty() {
                fmt!(clause, " FOR ORDER BY {}", operator.order_by_family);
            }
            clauses.push(clause);
        }
        for function in &class.functions {
            let mut clause = format!("FUNCTION {} ", function.support_number);
            if !function.left_type.is_empty() {
                fmt!(clause, "({}, {}) ", function.left_type, function.right_type);
            }
            clause.push_str(&function.function_name);
            clauses.push(clause);
        }
        if class.storage_type != "-" || clauses.is_empty() {
            let storage = if class.storage_type == "-" {
                &class.ty
            } else {
                &class.storage_type
            };
            clauses.push(format!("STORAGE {storage}"));
        }
        fmt!(sql, " AS\n\t{};", Fields(&clauses));

        let fqn = class.fqn();
        sql.push_str(&self.object_metadata(meta, &fqn, "OPERATOR CLASS", None));

        Block::new(
            MetadataEntry::new(&class.schema, &class.name, "OPERATOR CLASS"),
            sql,
        )
    }
}
