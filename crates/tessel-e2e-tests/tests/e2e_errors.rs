mod common;

use tessel_interp::Buffer;
use tessel_ir::{BinaryOp, Value};
use tessel_lower::{LowerError, LowerOptions, RuleContext, RuleTable, build_kernel};
use tessel_program::{
    AtomicOp, Atom, Aval, BlockDim, BlockMapping, DType, GridSpec, IndexerSpec, Primitive,
    PrimitiveKind, Program, ProgramBuilder, ProgramError, int32,
};

/// `o = f(x)` for a user-named operation `f`.
fn custom_program(name: &str) -> Program {
    let r = Aval::reference(vec![4], DType::Float32);
    let mut b = ProgramBuilder::new();
    let x = Atom::Var(b.input(r.clone()));
    let o = Atom::Var(b.input(r));
    let xv = b
        .apply1(Primitive::Get { indexer: IndexerSpec::full(1) }, vec![x])
        .unwrap();
    let y = b
        .apply1(
            Primitive::Custom {
                name: name.into(),
                outputs: vec![Aval::array(vec![4], DType::Float32)],
            },
            vec![xv],
        )
        .unwrap();
    b.apply(Primitive::Swap { indexer: IndexerSpec::full(1) }, vec![o, y])
        .unwrap();
    b.finish(Vec::new()).unwrap()
}

fn operands() -> Vec<Aval> {
    vec![Aval::array(vec![4], DType::Float32); 2]
}

#[test]
fn unknown_operations_are_unsupported() {
    let err = common::try_lower(&custom_program("erf_inv"), &operands(), &GridSpec::new(vec![1]))
        .unwrap_err();
    assert!(matches!(
        err,
        LowerError::UnsupportedOperation(PrimitiveKind::Custom(ref name)) if name == "erf_inv"
    ));
    assert!(err.to_string().contains("erf_inv"));
}

fn double(
    ctx: &mut RuleContext<'_>,
    args: &[Value],
    _primitive: &Primitive,
) -> Result<Vec<Value>, LowerError> {
    Ok(vec![ctx.builder().binary(BinaryOp::Add, args[0], args[0])?])
}

#[test]
fn registered_rules_extend_the_table() {
    let mut rules = RuleTable::with_builtins();
    assert!(rules.register(PrimitiveKind::Custom("double".into()), double).is_none());

    let kernel = build_kernel(
        &custom_program("double"),
        &operands(),
        &GridSpec::new(vec![1]),
        "double",
        &rules,
        &LowerOptions::default(),
    )
    .unwrap();
    let memory = common::run_kernel(
        &kernel,
        vec![
            Buffer::from_f32(&[1.0, 2.0, 3.0, 4.0]),
            Buffer::zeros(tessel_ir::Scalar::F32, 4),
        ],
    );
    assert_eq!(common::f32s(&memory, 1), vec![2.0, 4.0, 6.0, 8.0]);
}

#[test]
fn while_loops_are_not_implemented() {
    let mut step = ProgramBuilder::new();
    let i = step.input(Aval::scalar(DType::Int32));
    let step = step.finish(vec![Atom::Var(i)]).unwrap();

    let mut b = ProgramBuilder::new();
    let o = Atom::Var(b.input(Aval::reference(Vec::new(), DType::Int32)));
    let result = b
        .apply1(
            Primitive::While {
                cond: Box::new(step.clone()),
                body: Box::new(step),
            },
            vec![int32(0)],
        )
        .unwrap();
    b.apply(Primitive::Swap { indexer: IndexerSpec::full(0) }, vec![o, result])
        .unwrap();
    let program = b.finish(Vec::new()).unwrap();

    let err = common::try_lower(&program, &[Aval::scalar(DType::Int32)], &GridSpec::new(vec![1]))
        .unwrap_err();
    assert!(matches!(err, LowerError::NotImplemented(ref what) if what == "while loops"));
}

#[test]
fn small_integer_atomics_are_rejected() {
    let r = Aval::reference(vec![4], DType::Int8);
    let mut b = ProgramBuilder::new();
    let x = Atom::Var(b.input(r.clone()));
    let o = Atom::Var(b.input(r));
    let xv = b
        .apply1(Primitive::Get { indexer: IndexerSpec::full(1) }, vec![x])
        .unwrap();
    let err = b
        .apply(
            Primitive::AtomicRmw {
                indexer: IndexerSpec::full(1),
                atomic: AtomicOp::Add,
                masked: false,
            },
            vec![o, xv],
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ProgramError::UnsupportedAtomicType {
            op: AtomicOp::Add,
            dtype: DType::Int8
        }
    ));
    assert_eq!(
        LowerError::from(err).to_string(),
        "atomic add is not supported for int8"
    );
}

#[test]
fn kernels_may_not_return_values() {
    let mut b = ProgramBuilder::new();
    let x = Atom::Var(b.input(Aval::reference(vec![4], DType::Float32)));
    let xv = b
        .apply1(Primitive::Get { indexer: IndexerSpec::full(1) }, vec![x])
        .unwrap();
    let program = b.finish(vec![xv]).unwrap();

    let err = common::try_lower(
        &program,
        &[Aval::array(vec![4], DType::Float32)],
        &GridSpec::new(vec![1]),
    )
    .unwrap_err();
    assert!(matches!(err, LowerError::NotImplemented(_)));
}

#[test]
fn operands_must_match_their_block_shape() {
    let mapping = BlockMapping {
        block_shape: vec![BlockDim::Extent(8)],
        index_map: common::index_map(1, &[Some(0)]),
    };
    let mut spec = GridSpec::new(vec![4]);
    spec.block_mappings = vec![Some(mapping.clone()), Some(mapping)];

    // The kernel sees whole 4-element references, not 8-element blocks.
    let full = vec![Aval::array(vec![32], DType::Float32); 2];
    let err = common::try_lower(&custom_program("erf_inv"), &full, &spec).unwrap_err();
    assert!(matches!(
        err,
        LowerError::ShapeMismatch { ref expected, ref actual } if expected == &[8] && actual == &[4]
    ));
}

#[test]
fn empty_grid_axes_are_rejected() {
    let err = common::try_lower(&custom_program("erf_inv"), &operands(), &GridSpec::new(vec![2, 0]))
        .unwrap_err();
    assert!(err.to_string().contains("empty axis"));
}

#[test]
fn grids_beyond_the_index_range_are_rejected() {
    let mut request = common::load_demo("add");
    request.grid_spec.grid = vec![usize::MAX, 3, 1, 1];
    let err = request.lower(&RuleTable::with_builtins()).unwrap_err();
    assert!(matches!(err, LowerError::Program(ProgramError::IndexOverflow(_))));
    assert!(err.to_string().contains("32-bit index range"));
}
