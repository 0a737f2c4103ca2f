//! `allOf` merge engine.
//!
//! Collapses a node's `allOf` members plus its own sibling fields into one
//! canonical node. Contributor order is allOf members first, siblings last,
//! so last-wins keywords let the top level beat any member. Each keyword
//! merges by its own policy; conflicts report through `on_merge_error` and
//! drop the keyword rather than failing the pass.
//!
//! Merges are memoized per contributor list, and the result node is recorded
//! before its content is filled, so cyclic contributor graphs merge into
//! cyclic results instead of recursing forever.

use indexmap::IndexMap;
use serde_json::Number;

use crate::error::NormalizeError;
use crate::graph::{Node, NodeId};
use crate::rules::{KeyRule, Role};
use crate::types::Combinator;
use crate::walker::{Hook, Visit, Walker};

/// Merge link of the main hook chain; runs after reference resolution.
pub(crate) const HOOK: Hook = Hook { enter };

fn enter(w: &mut Walker<'_>, id: NodeId, role: Role) -> Result<Visit, NormalizeError> {
    if role != Role::Schema || !w.opts.merge_all_of {
        return Ok(Visit::descend());
    }
    let Some(map) = w.graph.object(id) else {
        return Ok(Visit::descend());
    };

    let mut all_of = None;
    for (key, value) in map {
        if w.rules.classify(key) == KeyRule::Combinator(Combinator::AllOf) {
            all_of = Some((key.clone(), *value));
            break;
        }
    }
    let Some((all_of_key, list)) = all_of else {
        return Ok(Visit::descend());
    };
    let Some(members) = w.graph.array(list).map(|m| m.to_vec()) else {
        // Malformed combinator value; the validate pre-check reports it.
        return Ok(Visit::descend());
    };

    let mut contributors = members;
    let siblings: Vec<(String, NodeId)> = w
        .graph
        .object(id)
        .map(|m| {
            m.iter()
                .filter(|(k, _)| k.as_str() != all_of_key)
                .map(|(k, v)| (k.clone(), *v))
                .collect()
        })
        .unwrap_or_default();
    if !siblings.is_empty() {
        let mut sibling_map = IndexMap::new();
        for (key, value) in siblings {
            sibling_map.insert(key, value);
        }
        let sibling_node = w.graph.insert(Node::Object(sibling_map));
        if let Some(origin) = w.cx.defining.get(&id).copied() {
            w.cx.defining.insert(sibling_node, origin);
        }
        contributors.push(sibling_node);
    }

    let merged = merge_nodes(w, &contributors)?;
    if merged != id {
        // In-place: the node keeps its id so cycles through it stay coherent.
        let content = w.graph.node(merged).clone();
        *w.graph.node_mut(id) = content;
        if let Some(fields) = w.cx.origin_fields.get(&merged).cloned() {
            w.cx.origin_fields.insert(id, fields);
        } else {
            w.cx.origin_fields.remove(&id);
        }
    }
    Ok(Visit::descend())
}

/// Merge processed contributors into one node.
///
/// Every contributor is pushed through the hook chain first; non-schema
/// members (null, primitives, empty containers) drop out silently. A single
/// surviving contributor is returned as-is, sharing its instance.
pub(crate) fn merge_nodes(
    w: &mut Walker<'_>,
    contributors: &[NodeId],
) -> Result<NodeId, NormalizeError> {
    let mut processed: Vec<NodeId> = Vec::with_capacity(contributors.len());
    for &contributor in contributors {
        let done = w.process(contributor, Role::Schema)?;
        if !is_schema_shaped(w, done) {
            continue;
        }
        if !processed.contains(&done) {
            processed.push(done);
        }
    }

    match processed.len() {
        0 => return Ok(empty_result(w)),
        1 => return Ok(processed[0]),
        _ => {}
    }

    if let Some(&memoized) = w.cx.merge_memo.get(&processed) {
        return Ok(memoized);
    }
    let result = w.graph.insert(Node::Object(IndexMap::new()));
    w.cx.merge_memo.insert(processed.clone(), result);

    // First-seen keyword order across contributors.
    let mut keywords: IndexMap<String, Vec<(NodeId, NodeId)>> = IndexMap::new();
    for &contributor in &processed {
        let entries: Vec<(String, NodeId)> = w
            .graph
            .object(contributor)
            .map(|m| m.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default();
        for (key, value) in entries {
            if key == "additionalItems" && has_uniform_items(w, contributor) {
                // Meaningless next to object-form items; suppressed.
                continue;
            }
            keywords
                .entry(key)
                .or_default()
                .push((contributor, value));
        }
    }

    let mut impossible = false;
    for (key, entries) in keywords {
        match merge_keyword(w, &key, &entries, &processed)? {
            Outcome::Keep(value) => {
                if let Some(map) = w.graph.object_mut(result) {
                    map.insert(key.clone(), value);
                }
                record_keyword_origins(w, result, &key, &entries);
            }
            Outcome::Drop => {}
            Outcome::Impossible => impossible = true,
        }
    }

    if impossible && w.opts.allow_not_valid_synthetic_changes {
        let sentinel = type_sentinel(w, "nothing");
        *w.graph.node_mut(result) = w.graph.node(sentinel).clone();
    } else if w.graph.object(result).is_some_and(|m| m.is_empty())
        && w.opts.allow_not_valid_synthetic_changes
    {
        let sentinel = type_sentinel(w, "any");
        *w.graph.node_mut(result) = w.graph.node(sentinel).clone();
    }

    Ok(result)
}

fn empty_result(w: &mut Walker<'_>) -> NodeId {
    if w.opts.allow_not_valid_synthetic_changes {
        type_sentinel(w, "any")
    } else {
        w.graph.insert(Node::Object(IndexMap::new()))
    }
}

fn type_sentinel(w: &mut Walker<'_>, name: &str) -> NodeId {
    let value = w.graph.insert(Node::String(name.to_string()));
    let mut map = IndexMap::new();
    map.insert("type".to_string(), value);
    w.graph.insert(Node::Object(map))
}

/// Anything that cannot constrain an instance drops out of the merge.
fn is_schema_shaped(w: &Walker<'_>, id: NodeId) -> bool {
    match w.graph.node(id) {
        Node::Object(map) => !map.is_empty(),
        _ => false,
    }
}

fn has_uniform_items(w: &Walker<'_>, contributor: NodeId) -> bool {
    w.graph
        .key(contributor, "items")
        .is_some_and(|items| w.graph.object(items).is_some())
}

fn record_keyword_origins(
    w: &mut Walker<'_>,
    result: NodeId,
    key: &str,
    entries: &[(NodeId, NodeId)],
) {
    if w.opts.origins_flag.is_none() {
        return;
    }
    let last_wins = matches!(key, "title" | "description" | "examples" | "default");
    let sources: Vec<NodeId> = if last_wins {
        entries.last().map(|(c, _)| *c).into_iter().collect()
    } else {
        entries.iter().map(|(c, _)| *c).collect()
    };
    let mut merged: Vec<crate::origins::OriginId> = Vec::new();
    for source in sources {
        if let Some(fields) = w.cx.origin_fields.get(&source) {
            if let Some(chain) = fields.get(key) {
                for origin in chain {
                    if !merged.contains(origin) {
                        merged.push(*origin);
                    }
                }
            }
        }
    }
    for origin in merged {
        w.cx.record_origin(result, key, origin);
    }
}

enum Outcome {
    Keep(NodeId),
    Drop,
    Impossible,
}

fn merge_keyword(
    w: &mut Walker<'_>,
    key: &str,
    entries: &[(NodeId, NodeId)],
    contributors: &[NodeId],
) -> Result<Outcome, NormalizeError> {
    // A lone exclusivity flag still has to follow its merged bound.
    if entries.len() == 1 && !matches!(key, "exclusiveMinimum" | "exclusiveMaximum") {
        return Ok(Outcome::Keep(entries[0].1));
    }
    if let KeyRule::Combinator(c) = w.rules.classify(key) {
        return Ok(merge_combinator_lists(w, key, c, entries));
    }
    match key {
        "minimum" | "minLength" | "minItems" | "minProperties" | "minContains" => {
            Ok(pick_bound(w, key, entries, BoundKind::Lower))
        }
        "maximum" | "maxLength" | "maxItems" | "maxProperties" | "maxContains" => {
            Ok(pick_bound(w, key, entries, BoundKind::Upper))
        }
        "exclusiveMinimum" => Ok(merge_exclusive(
            w,
            entries,
            contributors,
            "minimum",
            BoundKind::Lower,
        )),
        "exclusiveMaximum" => Ok(merge_exclusive(
            w,
            entries,
            contributors,
            "maximum",
            BoundKind::Upper,
        )),
        "multipleOf" => Ok(merge_multiple_of(w, entries)),
        "pattern" => Ok(merge_pattern(w, entries)),
        "type" => Ok(merge_type(w, entries)),
        "enum" => Ok(merge_enum(w, entries)),
        "const" => Ok(merge_const(w, entries)),
        "required" => Ok(merge_string_union(w, entries)),
        "title" | "description" | "examples" | "default" => {
            Ok(Outcome::Keep(entries[entries.len() - 1].1))
        }
        "uniqueItems" | "readOnly" | "writeOnly" | "deprecated" => {
            Ok(merge_true_wins(w, entries))
        }
        "properties" | "patternProperties" | "$defs" | "definitions"
        | "dependentSchemas" => merge_schema_map(w, entries),
        "dependencies" | "dependentRequired" => merge_dependencies(w, entries),
        "additionalProperties" => merge_gate_schema(w, entries),
        "items" => merge_items(w, entries),
        "additionalItems" | "propertyNames" | "contains" | "not" => {
            merge_all(w, entries).map(Outcome::Keep)
        }
        _ => Ok(merge_by_equality(w, key, entries)),
    }
}

/// Recursive merge of every entry value.
fn merge_all(w: &mut Walker<'_>, entries: &[(NodeId, NodeId)]) -> Result<NodeId, NormalizeError> {
    let values: Vec<NodeId> = entries.iter().map(|(_, v)| *v).collect();
    merge_nodes(w, &values)
}

fn merge_by_equality(w: &mut Walker<'_>, key: &str, entries: &[(NodeId, NodeId)]) -> Outcome {
    let first = entries[0].1;
    if entries[1..]
        .iter()
        .all(|(_, v)| w.graph.structural_eq(first, *v))
    {
        return Outcome::Keep(first);
    }
    w.opts.report_merge_error(&format!(
        "conflicting values for \"{}\" cannot be merged",
        key
    ));
    Outcome::Drop
}

/// Same-combinator collision: structurally equal lists collapse to one copy;
/// otherwise the conflict is reported and the last contributor wins.
fn merge_combinator_lists(
    w: &mut Walker<'_>,
    key: &str,
    _kind: Combinator,
    entries: &[(NodeId, NodeId)],
) -> Outcome {
    let first = entries[0].1;
    if entries[1..]
        .iter()
        .all(|(_, v)| w.graph.structural_eq(first, *v))
    {
        return Outcome::Keep(first);
    }
    w.opts.report_merge_error(&format!(
        "conflicting \"{}\" lists; keeping the last contributor",
        key
    ));
    Outcome::Keep(entries[entries.len() - 1].1)
}

#[derive(Clone, Copy, PartialEq)]
enum BoundKind {
    Lower,
    Upper,
}

fn number_of(w: &Walker<'_>, id: NodeId) -> Option<Number> {
    match w.graph.node(id) {
        Node::Number(n) => Some(n.clone()),
        _ => None,
    }
}

fn as_f64(n: &Number) -> f64 {
    n.as_f64().unwrap_or(f64::NAN)
}

/// Most restrictive bound: max of lower bounds, min of upper bounds.
fn pick_bound(
    w: &mut Walker<'_>,
    key: &str,
    entries: &[(NodeId, NodeId)],
    kind: BoundKind,
) -> Outcome {
    let mut best: Option<(NodeId, f64)> = None;
    for (_, value) in entries {
        let Some(n) = number_of(w, *value) else {
            w.opts
                .report_merge_error(&format!("non-numeric \"{}\" in allOf", key));
            return Outcome::Drop;
        };
        let v = as_f64(&n);
        let wins = match best {
            None => true,
            Some((_, current)) => match kind {
                BoundKind::Lower => v > current,
                BoundKind::Upper => v < current,
            },
        };
        if wins {
            best = Some((*value, v));
        }
    }
    match best {
        Some((id, _)) => Outcome::Keep(id),
        None => Outcome::Drop,
    }
}

/// Exclusivity follows the bound that won.
///
/// Numeric (2020-12) forms merge like their bound; draft-04 boolean forms
/// adopt the flag of the contributor supplying the winning bound, with true
/// winning a tie. The paired bound merges across every contributor, flag
/// carrier or not, so a flag whose own bound loses resolves to false.
fn merge_exclusive(
    w: &mut Walker<'_>,
    entries: &[(NodeId, NodeId)],
    contributors: &[NodeId],
    bound_key: &str,
    kind: BoundKind,
) -> Outcome {
    let all_numeric = entries
        .iter()
        .all(|(_, v)| matches!(w.graph.node(*v), Node::Number(_)));
    if all_numeric {
        return pick_bound(w, "exclusive bound", entries, kind);
    }

    // Winning paired bound across every contributor.
    let mut winning: Option<f64> = None;
    for &contributor in contributors {
        let Some(bound) = w.graph.key(contributor, bound_key) else {
            continue;
        };
        let Some(n) = number_of(w, bound) else { continue };
        let v = as_f64(&n);
        winning = Some(match winning {
            None => v,
            Some(current) => match kind {
                BoundKind::Lower => v.max(current),
                BoundKind::Upper => v.min(current),
            },
        });
    }

    let mut flag = false;
    for (contributor, value) in entries {
        let is_true = matches!(w.graph.node(*value), Node::Bool(true));
        if !is_true {
            continue;
        }
        match (winning, w.graph.key(*contributor, bound_key)) {
            (Some(target), Some(bound)) => {
                if number_of(w, bound).is_some_and(|n| as_f64(&n) == target) {
                    flag = true;
                }
            }
            // A flag without its own bound cannot claim somebody else's.
            (Some(_), None) => {}
            // No bound anywhere; a bare true flag stays true.
            (None, _) => flag = true,
        }
    }
    let node = w.graph.insert(Node::Bool(flag));
    Outcome::Keep(node)
}

/// Number of digits after the decimal point in the canonical rendering.
fn decimal_mantissa(n: &Number) -> Option<(i128, u32)> {
    let text = n.to_string();
    if text.contains(['e', 'E']) {
        return None;
    }
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.as_str()),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    let mut mantissa: i128 = 0;
    for c in int_part.chars().chain(frac_part.chars()) {
        let digit = c.to_digit(10)? as i128;
        mantissa = mantissa.checked_mul(10)?.checked_add(digit)?;
    }
    if negative {
        mantissa = -mantissa;
    }
    Some((mantissa, frac_part.len() as u32))
}

fn gcd(a: i128, b: i128) -> i128 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Rational-aware least common multiple.
///
/// Every contributor is scaled by the smallest power of ten that makes all
/// of them integral, then folded by integer LCM. The scaled result is kept
/// as-is: 0.2 and 0.3 scale to 2 and 3 and combine to 6.
fn merge_multiple_of(w: &mut Walker<'_>, entries: &[(NodeId, NodeId)]) -> Outcome {
    let mut parsed = Vec::with_capacity(entries.len());
    for (_, value) in entries {
        let scaled = number_of(w, *value).as_ref().and_then(decimal_mantissa);
        match scaled {
            Some((mantissa, decimals)) if mantissa != 0 => {
                parsed.push((mantissa.abs(), decimals))
            }
            _ => {
                w.opts
                    .report_merge_error("cannot combine multipleOf values");
                return Outcome::Drop;
            }
        }
    }
    let max_decimals = parsed.iter().map(|(_, d)| *d).max().unwrap_or(0);
    let mut lcm: i128 = 1;
    for (mantissa, decimals) in parsed {
        let Some(scale) = 10i128.checked_pow(max_decimals - decimals) else {
            w.opts
                .report_merge_error("cannot combine multipleOf values");
            return Outcome::Drop;
        };
        let Some(scaled) = mantissa.checked_mul(scale) else {
            w.opts
                .report_merge_error("cannot combine multipleOf values");
            return Outcome::Drop;
        };
        let Some(next) = (lcm / gcd(lcm, scaled)).checked_mul(scaled) else {
            w.opts
                .report_merge_error("cannot combine multipleOf values");
            return Outcome::Drop;
        };
        lcm = next;
    }
    let Ok(value) = u64::try_from(lcm) else {
        w.opts
            .report_merge_error("cannot combine multipleOf values");
        return Outcome::Drop;
    };
    let node = w.graph.insert(Node::Number(Number::from(value)));
    Outcome::Keep(node)
}

/// Pattern conjunction via zero-width lookaheads.
fn merge_pattern(w: &mut Walker<'_>, entries: &[(NodeId, NodeId)]) -> Outcome {
    let mut patterns: Vec<String> = Vec::new();
    for (_, value) in entries {
        let Some(p) = w.graph.string(*value).map(str::to_string) else {
            w.opts.report_merge_error("non-string pattern in allOf");
            return Outcome::Drop;
        };
        if !patterns.contains(&p) {
            patterns.push(p);
        }
    }
    if patterns.len() == 1 {
        return Outcome::Keep(entries[0].1);
    }
    let joined: String = patterns
        .iter()
        .map(|p| format!("(?={})", p))
        .collect();
    let node = w.graph.insert(Node::String(joined));
    Outcome::Keep(node)
}

fn type_list(w: &Walker<'_>, value: NodeId) -> Option<Vec<String>> {
    match w.graph.node(value) {
        Node::String(s) => Some(vec![s.clone()]),
        Node::Array(items) => {
            let items = items.clone();
            let mut names = Vec::with_capacity(items.len());
            for item in items {
                names.push(w.graph.string(item)?.to_string());
            }
            Some(names)
        }
        _ => None,
    }
}

fn type_matches(candidate: &str, allowed: &[String]) -> bool {
    allowed.iter().any(|t| t == candidate)
        // integer is the subset of number
        || (candidate == "integer" && allowed.iter().any(|t| t == "number"))
}

/// Set intersection over scalar-or-array type forms.
fn merge_type(w: &mut Walker<'_>, entries: &[(NodeId, NodeId)]) -> Outcome {
    let mut lists = Vec::with_capacity(entries.len());
    for (_, value) in entries {
        match type_list(w, *value) {
            Some(list) => lists.push(list),
            None => {
                w.opts.report_merge_error("malformed type in allOf");
                return Outcome::Drop;
            }
        }
    }
    let mut survivors: Vec<String> = Vec::new();
    for candidate in &lists[0] {
        let mut name = candidate.clone();
        for other in &lists[1..] {
            // number narrows to integer when any contributor demands it
            let narrowed = name == "number" && other.iter().any(|t| t == "integer");
            if narrowed {
                name = "integer".to_string();
            } else if !type_matches(&name, other) {
                name.clear();
                break;
            }
        }
        if !name.is_empty() && !survivors.contains(&name) {
            survivors.push(name);
        }
    }
    if survivors.is_empty() {
        w.opts
            .report_merge_error("allOf type intersection is empty");
        return Outcome::Impossible;
    }
    if survivors.len() == 1 {
        let node = w.graph.insert(Node::String(survivors.remove(0)));
        return Outcome::Keep(node);
    }
    let items: Vec<NodeId> = survivors
        .into_iter()
        .map(|name| w.graph.insert(Node::String(name)))
        .collect();
    let node = w.graph.insert(Node::Array(items));
    Outcome::Keep(node)
}

/// Structural-equality intersection of enum value lists.
fn merge_enum(w: &mut Walker<'_>, entries: &[(NodeId, NodeId)]) -> Outcome {
    let mut lists: Vec<Vec<NodeId>> = Vec::with_capacity(entries.len());
    for (_, value) in entries {
        match w.graph.array(*value) {
            Some(items) => lists.push(items.to_vec()),
            None => {
                w.opts.report_merge_error("malformed enum in allOf");
                return Outcome::Drop;
            }
        }
    }
    let mut survivors: Vec<NodeId> = Vec::new();
    for &candidate in &lists[0] {
        let everywhere = lists[1..].iter().all(|other| {
            other
                .iter()
                .any(|&v| w.graph.structural_eq(candidate, v))
        });
        let duplicate = survivors
            .iter()
            .any(|&kept| w.graph.structural_eq(kept, candidate));
        if everywhere && !duplicate {
            survivors.push(candidate);
        }
    }
    if survivors.is_empty() {
        w.opts
            .report_merge_error("allOf enum intersection is empty");
        return Outcome::Impossible;
    }
    let node = w.graph.insert(Node::Array(survivors));
    Outcome::Keep(node)
}

/// `const` intersects structurally; all contributors must agree.
fn merge_const(w: &mut Walker<'_>, entries: &[(NodeId, NodeId)]) -> Outcome {
    let first = entries[0].1;
    if entries[1..]
        .iter()
        .all(|(_, v)| w.graph.structural_eq(first, *v))
    {
        return Outcome::Keep(first);
    }
    w.opts
        .report_merge_error("allOf const values disagree");
    Outcome::Impossible
}

/// Union of string lists, first-seen order.
fn merge_string_union(w: &mut Walker<'_>, entries: &[(NodeId, NodeId)]) -> Outcome {
    let mut seen: Vec<String> = Vec::new();
    let mut items: Vec<NodeId> = Vec::new();
    for (_, value) in entries {
        let Some(list) = w.graph.array(*value).map(|l| l.to_vec()) else {
            w.opts
                .report_merge_error("non-array required in allOf");
            return Outcome::Drop;
        };
        for item in list {
            let Some(name) = w.graph.string(item).map(str::to_string) else {
                continue;
            };
            if !seen.contains(&name) {
                seen.push(name);
                items.push(item);
            }
        }
    }
    let node = w.graph.insert(Node::Array(items));
    Outcome::Keep(node)
}

fn merge_true_wins(w: &mut Walker<'_>, entries: &[(NodeId, NodeId)]) -> Outcome {
    let any_true = entries
        .iter()
        .any(|(_, v)| matches!(w.graph.node(*v), Node::Bool(true)));
    let node = w.graph.insert(Node::Bool(any_true));
    Outcome::Keep(node)
}

/// Key-wise recursion over schema maps (`properties` and friends).
///
/// A key contributed by exactly one side keeps its instance.
fn merge_schema_map(
    w: &mut Walker<'_>,
    entries: &[(NodeId, NodeId)],
) -> Result<Outcome, NormalizeError> {
    let mut per_key: IndexMap<String, Vec<NodeId>> = IndexMap::new();
    for (_, value) in entries {
        let Some(map) = w.graph.object(*value) else {
            w.opts
                .report_merge_error("malformed schema map in allOf");
            return Ok(Outcome::Drop);
        };
        let pairs: Vec<(String, NodeId)> =
            map.iter().map(|(k, v)| (k.clone(), *v)).collect();
        for (key, child) in pairs {
            per_key.entry(key).or_default().push(child);
        }
    }
    let mut merged = IndexMap::with_capacity(per_key.len());
    for (key, values) in per_key {
        let value = if values.len() == 1 {
            values[0]
        } else {
            merge_nodes(w, &values)?
        };
        merged.insert(key, value);
    }
    let node = w.graph.insert(Node::Object(merged));
    Ok(Outcome::Keep(node))
}

/// `dependencies`/`dependentRequired`: per key, string lists union like
/// `required`; schemas merge recursively; a mixed pair treats the list as
/// `{required: [...]}` first.
fn merge_dependencies(
    w: &mut Walker<'_>,
    entries: &[(NodeId, NodeId)],
) -> Result<Outcome, NormalizeError> {
    let mut per_key: IndexMap<String, Vec<NodeId>> = IndexMap::new();
    for (_, value) in entries {
        let Some(map) = w.graph.object(*value) else {
            w.opts
                .report_merge_error("malformed dependencies in allOf");
            return Ok(Outcome::Drop);
        };
        let pairs: Vec<(String, NodeId)> =
            map.iter().map(|(k, v)| (k.clone(), *v)).collect();
        for (key, child) in pairs {
            per_key.entry(key).or_default().push(child);
        }
    }
    let mut merged = IndexMap::with_capacity(per_key.len());
    for (key, values) in per_key {
        let value = if values.len() == 1 {
            values[0]
        } else if values
            .iter()
            .all(|v| matches!(w.graph.node(*v), Node::Array(_)))
        {
            let entries: Vec<(NodeId, NodeId)> =
                values.iter().map(|v| (*v, *v)).collect();
            match merge_string_union(w, &entries) {
                Outcome::Keep(node) => node,
                _ => continue,
            }
        } else {
            let schemas: Vec<NodeId> = values
                .iter()
                .map(|&v| match w.graph.node(v) {
                    Node::Array(_) => wrap_required(w, v),
                    _ => v,
                })
                .collect();
            merge_nodes(w, &schemas)?
        };
        merged.insert(key, value);
    }
    let node = w.graph.insert(Node::Object(merged));
    Ok(Outcome::Keep(node))
}

fn wrap_required(w: &mut Walker<'_>, list: NodeId) -> NodeId {
    let mut map = IndexMap::new();
    map.insert("required".to_string(), list);
    w.graph.insert(Node::Object(map))
}

/// `additionalProperties`: false is the strongest, then schema conjunction;
/// bare true drops out.
fn merge_gate_schema(
    w: &mut Walker<'_>,
    entries: &[(NodeId, NodeId)],
) -> Result<Outcome, NormalizeError> {
    if entries
        .iter()
        .any(|(_, v)| matches!(w.graph.node(*v), Node::Bool(false)))
    {
        let node = w.graph.insert(Node::Bool(false));
        return Ok(Outcome::Keep(node));
    }
    let schemas: Vec<(NodeId, NodeId)> = entries
        .iter()
        .filter(|(_, v)| w.graph.object(*v).is_some())
        .copied()
        .collect();
    match schemas.len() {
        0 => {
            let node = w.graph.insert(Node::Bool(true));
            Ok(Outcome::Keep(node))
        }
        1 => Ok(Outcome::Keep(schemas[0].1)),
        _ => merge_all(w, &schemas).map(Outcome::Keep),
    }
}

/// `items`: uniform schemas conjoin; tuples merge pairwise by index with the
/// longer tuple's tail kept, and uniform contributors constrain every slot.
fn merge_items(
    w: &mut Walker<'_>,
    entries: &[(NodeId, NodeId)],
) -> Result<Outcome, NormalizeError> {
    let mut tuples: Vec<Vec<NodeId>> = Vec::new();
    let mut uniforms: Vec<NodeId> = Vec::new();
    for (_, value) in entries {
        match w.graph.node(*value) {
            Node::Array(slots) => tuples.push(slots.clone()),
            Node::Object(_) => uniforms.push(*value),
            _ => {
                w.opts.report_merge_error("malformed items in allOf");
                return Ok(Outcome::Drop);
            }
        }
    }

    if tuples.is_empty() {
        let unified: Vec<NodeId> = uniforms;
        return if unified.len() == 1 {
            Ok(Outcome::Keep(unified[0]))
        } else {
            merge_nodes(w, &unified).map(Outcome::Keep)
        };
    }

    let longest = tuples.iter().map(Vec::len).max().unwrap_or(0);
    let mut slots: Vec<NodeId> = Vec::with_capacity(longest);
    for i in 0..longest {
        let mut parts: Vec<NodeId> = tuples
            .iter()
            .filter_map(|tuple| tuple.get(i).copied())
            .collect();
        parts.extend(uniforms.iter().copied());
        let slot = if parts.len() == 1 {
            parts[0]
        } else {
            merge_nodes(w, &parts)?
        };
        slots.push(slot);
    }
    let node = w.graph.insert(Node::Array(slots));
    Ok(Outcome::Keep(node))
}
