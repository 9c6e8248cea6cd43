//! Purpose: Numeric payload model and the layer records announced to the renderer.
//! Exports: `NdArray`, `LayerType`, `ArrayOptions`, `ArrayLayer`, `HrefLayer`.
//! Role: Validates caller arrays (numeric, rank <= 2) and derives layer type and subsize.
//! Invariants: A `2D` layer always carries a positive `subsize` that divides its length.
//! Invariants: Layer payloads are flattened row-major.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::error::{Error, ErrorKind};

/// A dense numeric array with an explicit shape. `values` is row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct NdArray {
    values: Vec<f64>,
    shape: Vec<usize>,
}

impl NdArray {
    pub fn new(values: Vec<f64>, shape: Vec<usize>) -> Result<Self, Error> {
        let expected = shape
            .iter()
            .try_fold(1usize, |acc, dim| acc.checked_mul(*dim))
            .ok_or_else(|| {
                Error::new(ErrorKind::Validation)
                    .with_message(format!("shape {shape:?} has too many elements"))
            })?;
        if expected != values.len() {
            return Err(Error::new(ErrorKind::Validation).with_message(format!(
                "shape {shape:?} needs {expected} values, got {}",
                values.len()
            )));
        }
        Ok(Self { values, shape })
    }

    pub fn from_vec(values: Vec<f64>) -> Self {
        let len = values.len();
        Self {
            values,
            shape: vec![len],
        }
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, Error> {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if rows.iter().any(|row| row.len() != width) {
            return Err(Error::new(ErrorKind::Validation)
                .with_message("rows must all have the same length"));
        }
        let height = rows.len();
        let values = rows.into_iter().flatten().collect();
        Ok(Self {
            values,
            shape: vec![height, width],
        })
    }

    /// Parses a (nested) JSON array of numbers. Bare scalars, strings,
    /// booleans, nulls, objects and ragged nesting are rejected.
    pub fn from_json(value: &Value) -> Result<Self, Error> {
        if !value.is_array() {
            return Err(Error::new(ErrorKind::Validation)
                .with_message(format!("expected a numeric array, found {}", json_type(value)))
                .with_hint("Wrap single samples in a list, e.g. [5]."));
        }
        let mut values = Vec::new();
        let shape = collect_json(value, &mut values)?;
        Ok(Self { values, shape })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Raw native-endian `f32` buffer, as consumed by `overlay_array`.
    pub fn to_f32_bytes(&self) -> Vec<u8> {
        self.values
            .iter()
            .flat_map(|value| (*value as f32).to_ne_bytes())
            .collect()
    }
}

fn collect_json(value: &Value, out: &mut Vec<f64>) -> Result<Vec<usize>, Error> {
    match value {
        Value::Number(number) => {
            let number = number.as_f64().ok_or_else(|| {
                Error::new(ErrorKind::Validation)
                    .with_message("array element is not representable as f64")
            })?;
            out.push(number);
            Ok(Vec::new())
        }
        Value::Array(items) => {
            let mut inner: Option<Vec<usize>> = None;
            for item in items {
                let shape = collect_json(item, out)?;
                match &inner {
                    None => inner = Some(shape),
                    Some(expected) if *expected != shape => {
                        return Err(Error::new(ErrorKind::Validation)
                            .with_message("array is ragged; every row must have the same shape"));
                    }
                    Some(_) => {}
                }
            }
            let mut shape = vec![items.len()];
            shape.extend(inner.unwrap_or_default());
            Ok(shape)
        }
        other => Err(Error::new(ErrorKind::Validation).with_message(format!(
            "array elements must be numeric, found {}",
            json_type(other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum LayerType {
    #[default]
    #[serde(rename = "1D")]
    OneD,
    #[serde(rename = "2D")]
    TwoD,
}

impl LayerType {
    pub fn as_str(self) -> &'static str {
        match self {
            LayerType::OneD => "1D",
            LayerType::TwoD => "2D",
        }
    }

    pub fn parse(value: &str) -> Result<Self, Error> {
        match value {
            "1D" => Ok(LayerType::OneD),
            "2D" => Ok(LayerType::TwoD),
            other => Err(Error::new(ErrorKind::Validation)
                .with_message(format!("unknown layer type {other:?}"))
                .with_hint("Use 1D or 2D.")),
        }
    }
}

/// Per-input knobs. Unset fields are derived from the array's shape.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArrayOptions {
    pub overrides: Map<String, Value>,
    pub layer_type: Option<LayerType>,
    pub subsize: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ArrayLayer {
    pub data: Vec<f64>,
    pub overrides: Map<String, Value>,
    #[serde(rename = "layerType")]
    pub layer_type: LayerType,
}

impl ArrayLayer {
    pub fn from_array(array: &NdArray, options: &ArrayOptions) -> Result<Self, Error> {
        if array.rank() > 2 {
            return Err(Error::new(ErrorKind::Validation).with_message(format!(
                "arrays must have rank 1 or 2, got shape {:?}",
                array.shape()
            )));
        }
        let layer_type = options.layer_type.unwrap_or(if array.rank() == 2 {
            LayerType::TwoD
        } else {
            LayerType::OneD
        });

        let mut overrides = options.overrides.clone();
        if layer_type == LayerType::TwoD {
            let subsize = match options.subsize {
                Some(subsize) => subsize,
                None => match overrides.get("subsize") {
                    Some(value) => value.as_u64().map(|v| v as usize).ok_or_else(|| {
                        Error::new(ErrorKind::Validation)
                            .with_message("overrides.subsize must be a non-negative integer")
                    })?,
                    None if array.rank() == 2 => array.shape()[1],
                    None => {
                        return Err(Error::new(ErrorKind::Validation)
                            .with_message("2D layers need a subsize")
                            .with_hint("Pass subsize or a 2-D array."));
                    }
                },
            };
            if subsize == 0 || array.values().len() % subsize != 0 {
                return Err(Error::new(ErrorKind::Validation).with_message(format!(
                    "subsize {subsize} does not evenly divide {} values",
                    array.values().len()
                )));
            }
            overrides.insert("subsize".to_string(), Value::from(subsize as u64));
        }

        Ok(Self {
            data: array.values().to_vec(),
            overrides,
            layer_type,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct HrefLayer {
    pub filename: String,
    #[serde(rename = "layerType")]
    pub layer_type: LayerType,
}

#[cfg(test)]
mod tests {
    use super::{ArrayLayer, ArrayOptions, LayerType, NdArray};
    use crate::core::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn json_arrays_report_shape() {
        let array = NdArray::from_json(&json!([[1, 2, 3, 4], [5, 6, 7, 8]])).expect("array");
        assert_eq!(array.shape(), &[2, 4]);
        assert_eq!(array.values().len(), 8);

        let array = NdArray::from_json(&json!([[[1], [2], [3], [4]], [[5], [6], [7], [8]]]))
            .expect("array");
        assert_eq!(array.shape(), &[2, 4, 1]);
    }

    #[test]
    fn non_numeric_and_ragged_json_is_rejected() {
        let cases = [
            json!(["foo", "bar", "baz"]),
            json!([1, true]),
            json!([[1, 2], [3]]),
            json!(null),
            json!(5),
        ];
        for value in cases {
            let err = NdArray::from_json(&value).expect_err("err");
            assert_eq!(err.kind(), ErrorKind::Validation, "{value}");
        }
    }

    #[test]
    fn two_d_infers_subsize_from_last_axis() {
        let array = NdArray::from_rows(vec![vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 6.0, 7.0, 8.0]])
            .expect("rows");
        let layer = ArrayLayer::from_array(&array, &ArrayOptions::default()).expect("layer");
        assert_eq!(layer.layer_type, LayerType::TwoD);
        assert_eq!(layer.data.len(), 8);
        assert_eq!(layer.overrides.get("subsize"), Some(&json!(4)));
    }

    #[test]
    fn oversized_shape_is_a_validation_error() {
        let err = NdArray::new(Vec::new(), vec![usize::MAX, 2]).expect_err("overflow");
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = NdArray::new(vec![1.0; 3], vec![2, 2]).expect_err("mismatch");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn rank_three_is_rejected() {
        let array = NdArray::new(vec![0.0; 8], vec![2, 4, 1]).expect("array");
        let err = ArrayLayer::from_array(&array, &ArrayOptions::default()).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn two_d_without_derivable_subsize_is_rejected() {
        let options = ArrayOptions {
            layer_type: Some(LayerType::TwoD),
            ..ArrayOptions::default()
        };
        let err = ArrayLayer::from_array(&NdArray::from_vec(vec![1.0, 2.0]), &options)
            .expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn explicit_subsize_must_divide_length() {
        let options = ArrayOptions {
            layer_type: Some(LayerType::TwoD),
            subsize: Some(3),
            ..ArrayOptions::default()
        };
        let array = NdArray::from_vec(vec![1.0; 8]);
        let err = ArrayLayer::from_array(&array, &options).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Validation);

        let options = ArrayOptions {
            subsize: Some(2),
            ..options
        };
        let layer = ArrayLayer::from_array(&array, &options).expect("layer");
        assert_eq!(layer.overrides.get("subsize"), Some(&json!(2)));
    }

    #[test]
    fn one_d_layer_serializes_like_the_renderer_expects() {
        let array = NdArray::from_vec(vec![1.0, 2.0, 3.0]);
        let layer = ArrayLayer::from_array(&array, &ArrayOptions::default()).expect("layer");
        assert_eq!(
            serde_json::to_value(&layer).expect("json"),
            json!({"data": [1.0, 2.0, 3.0], "overrides": {}, "layerType": "1D"})
        );
    }

    #[test]
    fn f32_buffer_is_native_endian() {
        let bytes = NdArray::from_vec(vec![1.0, 2.0]).to_f32_bytes();
        let mut expected = 1.0f32.to_ne_bytes().to_vec();
        expected.extend(2.0f32.to_ne_bytes());
        assert_eq!(bytes, expected);
    }
}
