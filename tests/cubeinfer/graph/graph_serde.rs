use anyhow::Result;
use cubeinfer::{GraphDescription, Parameter, RuntimeGraph};

use crate::common::filled;
use crate::graph_simple::diamond_description;

#[test]
fn description_round_trips_through_json_file() -> Result<()> {
    let description = diamond_description();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("diamond.json");
    description.save_json(&path)?;
    let loaded = GraphDescription::from_json_file(&path)?;
    assert_eq!(loaded, description);

    let inputs = [filled(2, 4, 4, 0.5), filled(2, 4, 4, -0.5)];
    let mut original = RuntimeGraph::with_builtin_layers(description);
    original.build("pnnx_input_0", "pnnx_output_0")?;
    let mut reloaded = RuntimeGraph::with_builtin_layers(loaded);
    reloaded.build("pnnx_input_0", "pnnx_output_0")?;
    assert_eq!(original.forward(&inputs, false)?, reloaded.forward(&inputs, false)?);
    Ok(())
}

#[test]
fn parameters_use_tagged_json() -> Result<()> {
    let json = r#"{"operators":[{"type":"nn.ReLU","name":"relu","params":{"slope":{"type":"float_array","value":[0.5,1.0]}}}]}"#;
    let description = GraphDescription::from_json_str(json)?;
    let op = &description.operators[0];
    assert_eq!(op.kind, "nn.ReLU");
    assert!(op.inputs.is_empty());
    assert_eq!(
        op.params.get("slope"),
        Some(&Parameter::FloatArray(vec![0.5, 1.0]))
    );
    assert!(GraphDescription::from_json_str("{\"operators\": 3}").is_err());
    Ok(())
}

#[test]
fn unsupported_attribute_dtype_fails_init() {
    let mut description = diamond_description();
    if let Some(attr) = description.operators[1].attrs.get_mut("weight") {
        attr.dtype = 7;
    }
    let mut graph = RuntimeGraph::with_builtin_layers(description);
    assert!(graph.init().is_err());
}
