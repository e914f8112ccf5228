//! MySQL `EXPLAIN FORMAT=JSON` interpretation.
//!
//! The JSON document is walked from `query_block` down to the accessed
//! tables. Every operation becomes a [`PlanNode`] one level below its
//! parent, and every table additionally yields a [`TableAccess`] with the
//! details shown in the plan view:
//!
//! ```text
//! Select (cost 12.10)
//! └─ Ordering Operation [filesort]
//!    └─ Nested Loop #1
//!       ├─ o (ALL)   rows 1000  filtered 10%
//!       └─ c (eq_ref) rows 1    filtered 100%
//! ```

use serde_json::{Map, Value};

/// One operation in the plan graph.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanNode {
    pub id: usize,
    pub parent: Option<usize>,
    /// Depth below the root select (root is 0).
    pub level: usize,
    pub label: String,
    pub cost: Option<String>,
    pub rows: Option<u64>,
    pub filtered: Option<f64>,
    /// Flags such as `filesort` or `temporary`.
    pub notes: Vec<String>,
}

/// Access details of one table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableAccess {
    pub table_name: String,
    pub access_type: Option<String>,
    pub rows: Option<u64>,
    pub filtered: Option<String>,
    pub read_cost: Option<String>,
    pub eval_cost: Option<String>,
    pub prefix_cost: Option<String>,
    pub data_read_per_join: Option<String>,
    pub possible_keys: Option<String>,
    pub key: Option<String>,
    pub used_key_parts: Option<String>,
    pub used_columns: Option<String>,
    pub index_condition: Option<String>,
    pub attached_condition: Option<String>,
}

/// Parsed EXPLAIN plan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPlan {
    pub nodes: Vec<PlanNode>,
    pub tables: Vec<TableAccess>,
}

impl QueryPlan {
    /// Parse an EXPLAIN JSON document. Returns `None` when it has no
    /// `query_block`.
    pub fn parse(json: &Value) -> Option<Self> {
        let block = json.get("query_block")?.as_object()?;
        let mut builder = PlanBuilder::default();
        builder.query_block(block, None, 0);
        Some(Self {
            nodes: builder.nodes,
            tables: builder.tables,
        })
    }

    /// Children of `id` in plan order.
    pub fn children(&self, id: usize) -> impl Iterator<Item = &PlanNode> + '_ {
        self.nodes.iter().filter(move |node| node.parent == Some(id))
    }

    /// Whether `id` is the last child of its parent, for tree drawing.
    pub fn is_last_child(&self, id: usize) -> bool {
        let Some(node) = self.nodes.get(id) else {
            return true;
        };
        match node.parent {
            Some(parent) => self.children(parent).last().map(|n| n.id) == Some(id),
            None => true,
        }
    }

    /// Total cost reported on the root select.
    pub fn query_cost(&self) -> Option<&str> {
        self.nodes.first().and_then(|node| node.cost.as_deref())
    }
}

#[derive(Default)]
struct PlanBuilder {
    nodes: Vec<PlanNode>,
    tables: Vec<TableAccess>,
    nested_loops: usize,
}

impl PlanBuilder {
    fn push(&mut self, parent: Option<usize>, level: usize, label: String) -> usize {
        let id = self.nodes.len();
        self.nodes.push(PlanNode {
            id,
            parent,
            level,
            label,
            cost: None,
            rows: None,
            filtered: None,
            notes: Vec::new(),
        });
        id
    }

    fn query_block(&mut self, block: &Map<String, Value>, parent: Option<usize>, level: usize) {
        let label = match block.get("select_id").and_then(scalar_text) {
            Some(id) if parent.is_some() => format!("Select #{}", id),
            _ => "Select".to_string(),
        };
        let id = self.push(parent, level, label);
        self.nodes[id].cost = block
            .get("cost_info")
            .and_then(|c| c.get("query_cost"))
            .and_then(scalar_text);
        self.operations(block, id, level + 1);
    }

    /// Walk the operation keys of a block or operation object.
    fn operations(&mut self, obj: &Map<String, Value>, parent: usize, level: usize) {
        const OPERATIONS: &[(&str, &str)] = &[
            ("ordering_operation", "Ordering Operation"),
            ("grouping_operation", "Grouping Operation"),
            ("duplicates_removal", "Duplicate Removal"),
            ("windowing", "Windowing"),
        ];

        for (key, label) in OPERATIONS {
            if let Some(op) = obj.get(*key).and_then(Value::as_object) {
                let id = self.push(Some(parent), level, label.to_string());
                self.nodes[id].notes = operation_notes(op);
                self.operations(op, id, level + 1);
            }
        }

        if let Some(loops) = obj.get("nested_loop").and_then(Value::as_array) {
            self.nested_loops += 1;
            let label = format!("Nested Loop #{}", self.nested_loops);
            let id = self.push(Some(parent), level, label);
            for entry in loops {
                if let Some(table) = entry.get("table").and_then(Value::as_object) {
                    self.table(table, id, level + 1);
                }
            }
        }

        if let Some(table) = obj.get("table").and_then(Value::as_object) {
            self.table(table, parent, level);
        }

        if let Some(union) = obj.get("union_result").and_then(Value::as_object) {
            let id = self.push(Some(parent), level, "Union Result".to_string());
            let specs = union
                .get("query_specifications")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            for spec in specs {
                if let Some(block) = spec.get("query_block").and_then(Value::as_object) {
                    self.query_block(block, Some(id), level + 1);
                }
            }
        }
    }

    fn table(&mut self, table: &Map<String, Value>, parent: usize, level: usize) {
        let access = TableAccess::from_json(table);
        let label = match &access.access_type {
            Some(access_type) => format!("{} ({})", access.table_name, access_type),
            None => access.table_name.clone(),
        };
        let id = self.push(Some(parent), level, label);
        let node = &mut self.nodes[id];
        node.cost = access.prefix_cost.clone();
        node.rows = access.rows;
        node.filtered = access.filtered.as_deref().and_then(|f| f.parse().ok());
        self.tables.push(access);

        // Derived tables carry their own query block.
        if let Some(block) = table
            .get("materialized_from_subquery")
            .and_then(|m| m.get("query_block"))
            .and_then(Value::as_object)
        {
            self.query_block(block, Some(id), level + 1);
        }
    }
}

fn operation_notes(op: &Map<String, Value>) -> Vec<String> {
    let mut notes = Vec::new();
    if op.get("using_filesort").and_then(Value::as_bool) == Some(true) {
        notes.push("filesort".to_string());
    }
    if op.get("using_temporary_table").and_then(Value::as_bool) == Some(true) {
        notes.push("temporary".to_string());
    }
    notes
}

impl TableAccess {
    fn from_json(table: &Map<String, Value>) -> Self {
        let text = |key: &str| table.get(key).and_then(scalar_text);
        let cost = |key: &str| {
            table
                .get("cost_info")
                .and_then(|c| c.get(key))
                .and_then(scalar_text)
        };
        let rows = table
            .get("rows_examined_per_scan")
            .or_else(|| table.get("rows"))
            .and_then(|v| v.as_u64().or_else(|| v.as_str()?.parse().ok()));

        Self {
            table_name: text("table_name").unwrap_or_else(|| "?".to_string()),
            access_type: text("access_type"),
            rows,
            filtered: text("filtered"),
            read_cost: cost("read_cost"),
            eval_cost: cost("eval_cost"),
            prefix_cost: cost("prefix_cost"),
            data_read_per_join: cost("data_read_per_join").or_else(|| text("data_read_per_join")),
            possible_keys: table.get("possible_keys").and_then(normalize_list),
            key: text("key"),
            used_key_parts: table.get("used_key_parts").and_then(normalize_list),
            used_columns: table.get("used_columns").and_then(normalize_list),
            index_condition: text("index_condition"),
            attached_condition: text("attached_condition"),
        }
    }

    /// Labelled fields that are present, in display order.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::new();
        let mut add = |label: &'static str, value: Option<String>| {
            if let Some(value) = value {
                fields.push((label, value));
            }
        };
        add("access_type", self.access_type.clone());
        add("rows", self.rows.map(|r| r.to_string()));
        add("filtered", self.filtered.as_ref().map(|f| format!("{}%", f)));
        add("read_cost", self.read_cost.clone());
        add("eval_cost", self.eval_cost.clone());
        add("prefix_cost", self.prefix_cost.clone());
        add("data_read_per_join", self.data_read_per_join.clone());
        add("possible_keys", self.possible_keys.clone());
        add("key", self.key.clone());
        add("used_key_parts", self.used_key_parts.clone());
        add("used_columns", self.used_columns.clone());
        add("index_condition", self.index_condition.clone());
        add("attached_condition", self.attached_condition.clone());
        fields
    }
}

/// Strings, numbers and booleans as display text.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Render a comma list as `a, b, c`, whether it arrives as a string or an
/// array. Empty lists yield `None`.
pub fn normalize_list(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Array(items) => items
            .iter()
            .filter_map(scalar_text)
            .collect::<Vec<_>>()
            .join(", "),
        other => scalar_text(other)?,
    };
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ordered_join_plan() -> Value {
        json!({
            "query_block": {
                "select_id": 1,
                "cost_info": { "query_cost": "1203.50" },
                "ordering_operation": {
                    "using_filesort": true,
                    "using_temporary_table": false,
                    "nested_loop": [
                        { "table": {
                            "table_name": "o",
                            "access_type": "ALL",
                            "possible_keys": "idx_customer,idx_created",
                            "rows_examined_per_scan": 1000,
                            "filtered": "10.00",
                            "cost_info": { "read_cost": "90.00", "eval_cost": "10.00", "prefix_cost": "100.00", "data_read_per_join": "1M" },
                            "used_columns": ["id", "customer_id", "total"],
                            "attached_condition": "(`shop`.`o`.`total` > 100)"
                        }},
                        { "table": {
                            "table_name": "c",
                            "access_type": "eq_ref",
                            "key": "PRIMARY",
                            "used_key_parts": ["id"],
                            "rows_examined_per_scan": 1,
                            "filtered": "100.00",
                            "cost_info": { "read_cost": "250.00", "eval_cost": "20.00", "prefix_cost": "370.00" }
                        }}
                    ]
                }
            }
        })
    }

    #[test]
    fn test_levels_follow_the_plan_shape() {
        let plan = QueryPlan::parse(&ordered_join_plan()).unwrap();
        let shape: Vec<(usize, &str)> = plan
            .nodes
            .iter()
            .map(|n| (n.level, n.label.as_str()))
            .collect();
        assert_eq!(
            shape,
            vec![
                (0, "Select"),
                (1, "Ordering Operation"),
                (2, "Nested Loop #1"),
                (3, "o (ALL)"),
                (3, "c (eq_ref)"),
            ]
        );
        assert_eq!(plan.query_cost(), Some("1203.50"));
        assert_eq!(plan.nodes[1].notes, vec!["filesort".to_string()]);
        assert_eq!(plan.children(2).count(), 2);
        assert!(plan.is_last_child(4));
        assert!(!plan.is_last_child(3));
    }

    #[test]
    fn test_table_nodes_carry_cost_rows_filtered() {
        let plan = QueryPlan::parse(&ordered_join_plan()).unwrap();
        let table = &plan.nodes[3];
        assert_eq!(table.cost.as_deref(), Some("100.00"));
        assert_eq!(table.rows, Some(1000));
        assert_eq!(table.filtered, Some(10.0));
    }

    #[test]
    fn test_table_access_details_are_normalized() {
        let plan = QueryPlan::parse(&ordered_join_plan()).unwrap();
        assert_eq!(plan.tables.len(), 2);

        let orders = &plan.tables[0];
        assert_eq!(orders.possible_keys.as_deref(), Some("idx_customer, idx_created"));
        assert_eq!(orders.used_columns.as_deref(), Some("id, customer_id, total"));
        assert_eq!(orders.data_read_per_join.as_deref(), Some("1M"));

        let customers = &plan.tables[1];
        assert_eq!(customers.key.as_deref(), Some("PRIMARY"));
        assert_eq!(customers.used_key_parts.as_deref(), Some("id"));
        assert!(customers.attached_condition.is_none());

        let labels: Vec<&str> = customers.fields().iter().map(|(l, _)| *l).collect();
        assert_eq!(
            labels,
            vec![
                "access_type",
                "rows",
                "filtered",
                "read_cost",
                "eval_cost",
                "prefix_cost",
                "key",
                "used_key_parts"
            ]
        );
    }

    #[test]
    fn test_single_table_plan() {
        let json = json!({
            "query_block": {
                "select_id": 1,
                "cost_info": { "query_cost": "0.35" },
                "table": { "table_name": "users", "access_type": "const", "rows_examined_per_scan": 1 }
            }
        });
        let plan = QueryPlan::parse(&json).unwrap();
        assert_eq!(plan.nodes.len(), 2);
        assert_eq!(plan.nodes[1].label, "users (const)");
        assert_eq!(plan.nodes[1].level, 1);
    }

    #[test]
    fn test_missing_query_block() {
        assert!(QueryPlan::parse(&json!({})).is_none());
        assert!(QueryPlan::parse(&Value::Null).is_none());
    }

    #[test]
    fn test_normalize_list() {
        assert_eq!(normalize_list(&json!("a,b , c")).as_deref(), Some("a, b, c"));
        assert_eq!(normalize_list(&json!(["x", "y"])).as_deref(), Some("x, y"));
        assert_eq!(normalize_list(&json!("")), None);
        assert_eq!(normalize_list(&json!([])), None);
    }
}
