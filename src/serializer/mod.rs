//! Stage and expression serializer
//!
//! Pure functions from the stage/expression trees to wire values:
//!
//! - constants pass through the value encoder unchanged
//! - fields become field-reference values, never plain strings
//! - functions and accumulators become function values
//! - projection maps become wire maps keyed by output name
//! - parameter enums become their lower-cased canonical name
//!
//! Wire maps are `BTreeMap`s, so equal pipelines serialize to identical bytes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{BuildError, BuildResult};
use crate::expr::{Accumulator, Expr, Field, Ordering};
use crate::pipeline::Pipeline;
use crate::stage::{GenericArg, JoinCondition, SampleSize, Stage};
use crate::value::{WireStage, WireValue};

/// Serialized pipeline, ready to submit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePipeline {
    pub stages: Vec<WireStage>,
}

impl WirePipeline {
    /// JSON document of the serialized pipeline
    pub fn to_json(&self) -> BuildResult<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| BuildError::serialization(e.to_string()))
    }

    /// Lowercase hex SHA-256 of the canonical JSON encoding
    pub fn fingerprint(&self) -> BuildResult<String> {
        let bytes =
            serde_json::to_vec(self).map_err(|e| BuildError::serialization(e.to_string()))?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }
}

impl Pipeline {
    /// Serializes the pipeline after checking it starts with a source stage
    pub fn to_wire(&self) -> BuildResult<WirePipeline> {
        serialize_pipeline(self)
    }
}

pub fn serialize_pipeline(pipeline: &Pipeline) -> BuildResult<WirePipeline> {
    pipeline.validate()?;
    let stages = pipeline
        .stages()
        .iter()
        .map(serialize_stage)
        .collect::<BuildResult<Vec<_>>>()?;
    Ok(WirePipeline { stages })
}

pub fn serialize_expr(expr: &Expr) -> WireValue {
    match expr {
        Expr::Constant(value) => value.clone(),
        Expr::Field(field) => field_ref(field),
        Expr::List(items) => WireValue::Array(items.iter().map(serialize_expr).collect()),
        Expr::Function(func) => WireValue::function(
            func.name(),
            func.params().iter().map(serialize_expr).collect(),
        ),
        Expr::Aggregate(acc) => serialize_accumulator(acc),
    }
}

fn serialize_accumulator(acc: &Accumulator) -> WireValue {
    let args = acc.arg().map(serialize_expr).into_iter().collect();
    WireValue::function(acc.name(), args)
}

fn field_ref(field: &Field) -> WireValue {
    WireValue::FieldReference(field.path().to_string())
}

fn string(value: &str) -> WireValue {
    WireValue::String(value.to_string())
}

pub fn serialize_ordering(ordering: &Ordering) -> WireValue {
    let mut map = BTreeMap::new();
    map.insert("direction".to_string(), string(ordering.direction().name()));
    map.insert("expression".to_string(), serialize_expr(ordering.expr()));
    WireValue::Map(map)
}

fn serialize_map(map: &BTreeMap<String, Expr>) -> WireValue {
    WireValue::Map(
        map.iter()
            .map(|(name, expr)| (name.clone(), serialize_expr(expr)))
            .collect(),
    )
}

fn nested_pipeline(pipeline: &Pipeline) -> BuildResult<WireValue> {
    Ok(WireValue::Pipeline(serialize_pipeline(pipeline)?.stages))
}

fn serialize_generic_arg(arg: &GenericArg) -> BuildResult<WireValue> {
    match arg {
        GenericArg::Expr(expr) => Ok(serialize_expr(expr)),
        GenericArg::Json(json) => WireValue::try_from(json.clone()),
        GenericArg::Pipeline(pipeline) => nested_pipeline(pipeline),
    }
}

pub fn serialize_stage(stage: &Stage) -> BuildResult<WireStage> {
    let name = stage.name();
    let wire = match stage {
        Stage::Collection { path } => {
            WireStage::new(name, vec![WireValue::Reference(format!("/{}", path))])
        }
        Stage::CollectionGroup { collection_id } => WireStage::new(
            name,
            vec![WireValue::Reference(String::new()), string(collection_id)],
        ),
        Stage::Database => WireStage::new(name, Vec::new()),
        Stage::Documents(docs) => WireStage::new(
            name,
            docs.iter()
                .map(|d| WireValue::Reference(d.absolute_path()))
                .collect(),
        ),
        Stage::Select(map) | Stage::AddFields(map) | Stage::Distinct(map) => {
            WireStage::new(name, vec![serialize_map(map)])
        }
        Stage::RemoveFields(fields) => {
            WireStage::new(name, fields.iter().map(field_ref).collect())
        }
        Stage::Filter(condition) => WireStage::new(name, vec![serialize_expr(condition.expr())]),
        Stage::Offset(n) | Stage::Limit(n) => WireStage::new(name, vec![WireValue::Integer(*n)]),
        Stage::Sort {
            orderings,
            density,
            truncation,
        } => WireStage::new(name, orderings.iter().map(serialize_ordering).collect())
            .with_option("density", string(density.name()))
            .with_option("truncation", string(truncation.name())),
        Stage::Aggregate {
            accumulators,
            groups,
        } => {
            let accumulators = WireValue::Map(
                accumulators
                    .iter()
                    .map(|(alias, acc)| (alias.clone(), serialize_accumulator(acc)))
                    .collect(),
            );
            WireStage::new(name, vec![accumulators, serialize_map(groups)])
        }
        Stage::FindNearest {
            field,
            vector,
            measure,
            options,
        } => {
            let mut wire = WireStage::new(
                name,
                vec![
                    field_ref(field),
                    WireValue::Array(vector.iter().copied().map(WireValue::Double).collect()),
                    string(measure.name()),
                ],
            );
            if let Some(limit) = options.limit {
                wire = wire.with_option("limit", WireValue::Integer(limit));
            }
            if let Some(distance_field) = &options.distance_field {
                wire = wire.with_option("distance_field", field_ref(distance_field));
            }
            wire
        }
        Stage::Join {
            kind,
            condition,
            left_alias,
            right_alias,
            right,
        } => {
            let condition = match condition {
                None => WireValue::Null,
                Some(JoinCondition::On(cond)) => serialize_expr(cond.expr()),
                Some(JoinCondition::Using(fields)) => {
                    WireValue::Array(fields.iter().map(field_ref).collect())
                }
            };
            let mut wire = WireStage::new(
                name,
                vec![string(kind.name()), condition, nested_pipeline(right)?],
            );
            if let Some(alias) = left_alias {
                wire = wire.with_option("left_alias", string(alias));
            }
            if let Some(alias) = right_alias {
                wire = wire.with_option("right_alias", string(alias));
            }
            wire
        }
        Stage::Unnest {
            field,
            alias,
            options,
        } => {
            let mut wire = WireStage::new(name, vec![field_ref(field), string(alias)])
                .with_option("mode", string(options.mode.name()));
            if let Some(index_field) = &options.index_field {
                wire = wire.with_option("index_field", string(index_field));
            }
            wire
        }
        Stage::Union(other) => WireStage::new(name, vec![nested_pipeline(other)?]),
        Stage::Sample(size) => {
            let amount = match size {
                SampleSize::Documents(n) => WireValue::Integer(*n),
                SampleSize::Percent(p) => WireValue::Double(*p),
            };
            WireStage::new(name, vec![amount, string(size.mode())])
        }
        Stage::Replace { expr, mode } => {
            WireStage::new(name, vec![serialize_expr(expr), string(mode.name())])
        }
        Stage::Generic(generic) => {
            let args = generic
                .args()
                .iter()
                .map(serialize_generic_arg)
                .collect::<BuildResult<Vec<_>>>()?;
            let mut wire = WireStage::new(name, args);
            for (key, value) in generic.options() {
                wire = wire.with_option(key.as_str(), serialize_generic_arg(value)?);
            }
            wire
        }
    };
    Ok(wire)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{count, field, ExprMethods};
    use crate::pipeline::PipelineSource;
    use serde_json::json;

    #[test]
    fn test_greater_than_filter_shape() {
        let stage = Stage::filter(field("rating").greater_than(3));
        let wire = serialize_stage(&stage).unwrap();
        assert_eq!(wire.name, "filter");
        assert_eq!(
            serde_json::to_value(&wire.args[0]).unwrap(),
            json!({"function_value": {
                "name": "greater_than",
                "args": [{"field_reference_value": "rating"}, {"integer_value": 3}]
            }})
        );
    }

    #[test]
    fn test_collection_group_args() {
        let wire = serialize_stage(&Stage::collection_group("reviews").unwrap()).unwrap();
        assert_eq!(
            wire.args,
            vec![
                WireValue::Reference(String::new()),
                WireValue::String("reviews".into())
            ]
        );
    }

    #[test]
    fn test_distinct_accumulator_and_count_all() {
        let acc = count("city").distinct(true);
        assert_eq!(
            serialize_expr(&Expr::from(acc)),
            WireValue::function("count_distinct", vec![WireValue::FieldReference("city".into())])
        );
        assert_eq!(
            serialize_expr(&Expr::from(crate::expr::count_all())),
            WireValue::function("count", vec![])
        );
    }

    #[test]
    fn test_sort_options() {
        let stage = Stage::sort(
            vec![field("ts").descending()],
            Default::default(),
            Default::default(),
        )
        .unwrap();
        let wire = serialize_stage(&stage).unwrap();
        assert_eq!(wire.options["density"], WireValue::String("unspecified".into()));
        assert_eq!(
            wire.args[0].as_map().unwrap()["direction"],
            WireValue::String("descending".into())
        );
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let p = PipelineSource::collection("orders")
            .unwrap()
            .limit(10)
            .unwrap();
        let a = p.to_wire().unwrap().fingerprint().unwrap();
        let b = p.to_wire().unwrap().fingerprint().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_generic_json_arg_must_be_encodable() {
        let stage = crate::stage::GenericStage::new("vendor")
            .unwrap()
            .json_arg(json!(u64::MAX));
        let err = serialize_stage(&Stage::Generic(stage)).unwrap_err();
        assert_eq!(err.code(), crate::errors::BuildErrorCode::Serialization);
    }
}
