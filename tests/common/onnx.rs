//! Writes small logistic-regression ONNX graphs: `sigmoid(x · W + b)`.
//!
//! Only the protobuf fields ONNX Runtime needs are encoded.

const FLOAT: u64 = 1;
const IR_VERSION: u64 = 8;
const OPSET: u64 = 13;

fn varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn int_field(out: &mut Vec<u8>, field: u64, value: u64) {
    varint(out, field << 3);
    varint(out, value);
}

fn bytes_field(out: &mut Vec<u8>, field: u64, bytes: &[u8]) {
    varint(out, (field << 3) | 2);
    varint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

fn tensor(name: &str, dims: &[u64], values: &[f32]) -> Vec<u8> {
    let mut out = Vec::new();
    for &dim in dims {
        int_field(&mut out, 1, dim);
    }
    int_field(&mut out, 2, FLOAT);
    bytes_field(&mut out, 8, name.as_bytes());
    let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    bytes_field(&mut out, 9, &raw);
    out
}

/// A float tensor declaration whose first dimension is the symbolic batch size.
fn value_info(name: &str, width: u64) -> Vec<u8> {
    let mut batch = Vec::new();
    bytes_field(&mut batch, 2, b"batch");
    let mut columns = Vec::new();
    int_field(&mut columns, 1, width);

    let mut shape = Vec::new();
    bytes_field(&mut shape, 1, &batch);
    bytes_field(&mut shape, 1, &columns);

    let mut tensor_type = Vec::new();
    int_field(&mut tensor_type, 1, FLOAT);
    bytes_field(&mut tensor_type, 2, &shape);

    let mut type_proto = Vec::new();
    bytes_field(&mut type_proto, 1, &tensor_type);

    let mut out = Vec::new();
    bytes_field(&mut out, 1, name.as_bytes());
    bytes_field(&mut out, 2, &type_proto);
    out
}

fn node(op_type: &str, inputs: &[&str], output: &str) -> Vec<u8> {
    let mut out = Vec::new();
    for input in inputs {
        bytes_field(&mut out, 1, input.as_bytes());
    }
    bytes_field(&mut out, 2, output.as_bytes());
    bytes_field(&mut out, 3, output.as_bytes());
    bytes_field(&mut out, 4, op_type.as_bytes());
    out
}

/// Encodes a model with input `features` `[batch, rows]` and output `score`
/// `[batch, cols]`, where `weights` is `rows x cols` and `bias` has `cols` entries.
pub fn logistic_model(weights: &[Vec<f32>], bias: &[f32]) -> Vec<u8> {
    let rows = weights.len() as u64;
    let cols = bias.len() as u64;
    let flat: Vec<f32> = weights.iter().flatten().copied().collect();

    let mut graph = Vec::new();
    bytes_field(&mut graph, 1, &node("MatMul", &["features", "W"], "logits"));
    bytes_field(&mut graph, 1, &node("Add", &["logits", "B"], "shifted"));
    bytes_field(&mut graph, 1, &node("Sigmoid", &["shifted"], "score"));
    bytes_field(&mut graph, 2, b"logistic");
    bytes_field(&mut graph, 5, &tensor("W", &[rows, cols], &flat));
    bytes_field(&mut graph, 5, &tensor("B", &[cols], bias));
    bytes_field(&mut graph, 11, &value_info("features", rows));
    bytes_field(&mut graph, 12, &value_info("score", cols));

    let mut opset = Vec::new();
    bytes_field(&mut opset, 1, b"");
    int_field(&mut opset, 2, OPSET);

    let mut model = Vec::new();
    int_field(&mut model, 1, IR_VERSION);
    bytes_field(&mut model, 2, b"nima_predict-tests");
    bytes_field(&mut model, 7, &graph);
    bytes_field(&mut model, 8, &opset);
    model
}
