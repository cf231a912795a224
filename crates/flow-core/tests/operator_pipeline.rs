use std::sync::Arc;

use flow_core::logic::LogicRegistry;
use flow_core::{AttributeDecl, AttributeKind, ContainerContext, FlowError, FnLogic, FunctionOperator, GraphDescription,
                JsonSerializer, Logic, LogicSpec, OperatorDecl, SerializerDescriptor, StreamSchema, Topology, Value,
                ValueShape};
use indexmap::IndexMap;
use serde_json::json;

fn word_schema() -> StreamSchema {
    StreamSchema::record(vec![AttributeDecl::new("word", AttributeKind::Rstring),
                              AttributeDecl::new("len", AttributeKind::Int64)])
}

fn registry() -> Arc<LogicRegistry> {
    let reg = Arc::new(LogicRegistry::new());
    reg.register("measure", |params| {
           let min = params.get("min").and_then(|v| v.as_i64()).unwrap_or(0);
           Ok(Arc::new(FnLogic::new(move |v: Value| {
                           let word = v.as_str()
                                       .ok_or_else(|| FlowError::Codec(format!("expected string, got {}", v.type_name())))?
                                       .to_string();
                           let len = word.chars().count() as i64;
                           if len < min {
                               return Ok(None);
                           }
                           let mut fields = IndexMap::new();
                           fields.insert("word".to_string(), Value::String(word));
                           fields.insert("len".to_string(), Value::Int(len));
                           Ok(Some(Value::Record(fields)))
                       })) as Arc<dyn Logic>)
       });
    reg
}

fn graph() -> GraphDescription {
    let mut topo = Topology::new("words");
    topo.add_stream("lines", &StreamSchema::string()).expect("stream");
    topo.add_stream("measured", &word_schema()).expect("stream");
    let logic = LogicSpec::new(ValueShape::PrimitiveString, "measure", json!({"min": 3})).expect("spec");
    topo.add_operator(OperatorDecl { name: "measure".into(),
                                     input: Some("lines".into()),
                                     output: Some("measured".into()),
                                     logic })
        .expect("operator");
    topo.into_description()
}

#[test]
fn operator_decodes_invokes_and_encodes() {
    let ctx = ContainerContext::builder("pe-words").logic_registry(registry()).build();
    // el grafo llega como JSON desde fuera del contenedor
    let graph = GraphDescription::from_json(&graph().to_json().expect("json")).expect("parse");
    let decl = graph.operator("measure").expect("operator decl");
    let op = FunctionOperator::from_decl(ctx.clone(), &graph, decl).expect("install operator");
    assert_eq!(op.name(), "measure");

    let input = ctx.codecs().resolve(ValueShape::PrimitiveString, None).expect("codec");
    let output = ctx.codecs().resolve_schema(&word_schema()).expect("codec");

    let out = op.process(&input.encode(Value::from("stream")).expect("encode"))
                .expect("process")
                .expect("value emitted");
    let mut expected = IndexMap::new();
    expected.insert("word".to_string(), Value::from("stream"));
    expected.insert("len".to_string(), Value::Int(6));
    assert_eq!(output.decode(&out).expect("decode"), Value::Record(expected));

    // valores filtrados no producen tuple
    assert!(op.process(&input.encode(Value::from("ab")).expect("encode")).expect("process").is_none());

    op.close();
    assert!(op.handle().is_closed());
    assert!(matches!(op.process(&input.encode(Value::from("late")).expect("encode")), Err(FlowError::Closed)));
}

#[test]
fn wrong_input_shape_is_a_codec_error() {
    let ctx = ContainerContext::builder("pe-words").logic_registry(registry()).build();
    let graph = graph();
    let op = FunctionOperator::from_decl(ctx.clone(), &graph, &graph.operators[0]).expect("install operator");
    let blob = ctx.codecs().resolve(ValueShape::BinaryBlob, None).expect("codec");
    let tuple = blob.encode(Value::Blob(vec![1, 2])).expect("encode");
    assert!(matches!(op.process(&tuple), Err(FlowError::Codec(_))));
}

#[test]
fn unregistered_logic_fails_installation() {
    let ctx = ContainerContext::builder("pe-empty").build();
    let graph = graph();
    match FunctionOperator::from_decl(ctx, &graph, &graph.operators[0]) {
        Err(FlowError::UnknownLogic(id)) => assert_eq!(id, "measure"),
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("operator installed without a factory"),
    }
}

// objs --measure--> (sin salida), con la forma y el serializer de `logic`
fn object_graph(logic: LogicSpec) -> GraphDescription {
    let mut topo = Topology::new("objects");
    topo.add_stream("objs", &StreamSchema::object(SerializerDescriptor::new("json", 1)))
        .expect("stream");
    topo.add_operator(OperatorDecl { name: "measure".into(),
                                     input: Some("objs".into()),
                                     output: None,
                                     logic })
        .expect("operator");
    topo.into_description()
}

#[test]
fn logic_shape_must_match_input_stream() {
    let ctx = ContainerContext::builder("pe-shape").logic_registry(registry()).build();
    let logic = LogicSpec::new(ValueShape::PrimitiveString, "measure", json!({})).expect("spec");
    let graph = object_graph(logic);
    match FunctionOperator::from_decl(ctx, &graph, &graph.operators[0]) {
        Err(FlowError::Config(msg)) => assert!(msg.contains("BoxedObject"), "{msg}"),
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("string logic installed on an object stream"),
    }
}

#[test]
fn logic_serializer_must_be_known_and_match_the_stream() {
    let ctx = ContainerContext::builder("pe-ser").logic_registry(registry()).build();
    let spec = LogicSpec::new(ValueShape::BoxedObject, "measure", json!({})).expect("spec");

    let graph = object_graph(spec.clone().with_serializer("json"));
    assert!(FunctionOperator::from_decl(ctx.clone(), &graph, &graph.operators[0]).is_ok());

    let graph = object_graph(spec.clone().with_serializer("msgpack"));
    assert!(matches!(FunctionOperator::from_decl(ctx.clone(), &graph, &graph.operators[0]),
                     Err(FlowError::UnknownSerializer(id)) if id == "msgpack"));

    ctx.codecs().register_serializer("msgpack", JsonSerializer::factory());
    assert!(matches!(FunctionOperator::from_decl(ctx.clone(), &graph, &graph.operators[0]),
                     Err(FlowError::Config(_))));

    // sólo los streams de objetos admiten serializer
    let strings = LogicSpec::new(ValueShape::PrimitiveString, "measure", json!({})).expect("spec")
                                                                                    .with_serializer("json");
    let mut topo = Topology::new("words");
    topo.add_stream("lines", &StreamSchema::string()).expect("stream");
    topo.add_operator(OperatorDecl { name: "measure".into(),
                                     input: Some("lines".into()),
                                     output: None,
                                     logic: strings })
        .expect("operator");
    let graph = topo.into_description();
    assert!(matches!(FunctionOperator::from_decl(ctx, &graph, &graph.operators[0]), Err(FlowError::Config(_))));
}
