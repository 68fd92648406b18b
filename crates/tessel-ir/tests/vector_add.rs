//! Integration test: build a block-tiled vector add kernel with the builder
//! and verify the module structure and text dump.

use tessel_ir::*;

/// ```text
/// pid = program_id(0)
/// offs = pid * 128 + arange(0, 128)
/// mask = offs < n
/// out[offs] = x[offs] + y[offs]   (masked)
/// ```
#[test]
fn build_masked_vector_add() {
    let mut b = Builder::new("vector_add");
    let x = b.argument("x", Type::pointer(Scalar::F32), Some(16));
    let y = b.argument("y", Type::pointer(Scalar::F32), Some(16));
    let out = b.argument("out", Type::pointer(Scalar::F32), Some(16));
    let n = b.argument("n", Type::scalar(Scalar::I32), None);

    let pid = b.program_id(0).unwrap();
    let block = b.constant(Literal::Int(128), Scalar::I32);
    let start = b.binary(BinaryOp::Multiply, pid, block).unwrap();
    let lanes = b.arange(0, 128).unwrap();
    let offs = b.binary(BinaryOp::Add, start, lanes).unwrap();
    let mask = b.binary(BinaryOp::Less, offs, n).unwrap();

    let xp = b.offset(x, offs).unwrap();
    let yp = b.offset(y, offs).unwrap();
    let xv = b.load(xp, Some(mask), None).unwrap();
    let yv = b.load(yp, Some(mask), None).unwrap();
    let sum = b.binary(BinaryOp::Add, xv, yv).unwrap();
    let op = b.offset(out, offs).unwrap();
    b.store(op, sum, Some(mask)).unwrap();
    b.ret();

    assert_eq!(b.shape(sum), &[128]);
    assert_eq!(b.element(op), Element::Pointer(Scalar::F32));

    let module = b.finish().unwrap();
    assert_eq!(module.entry_points.len(), 1);
    let func = &module.entry_points[0].function;
    assert_eq!(func.arguments.len(), 4);
    assert_eq!(func.arguments[3].divisibility, None);
    assert_eq!(func.expressions.len(), func.expression_types.len());

    // Pointer blocks and value blocks share a shape but not a type.
    let f32_block = module
        .types
        .iter()
        .filter(|(_, ty)| ty.shape == [128])
        .count();
    assert!(f32_block >= 4, "expected i32, i1, f32 and ptr blocks");

    let stores = func
        .body
        .iter()
        .filter(|s| matches!(s, Statement::Store { mask: Some(_), .. }))
        .count();
    assert_eq!(stores, 1);

    let text = dump_module(&module);
    assert!(text.contains("program_id 0"));
    assert!(text.contains("tensor<128xptr<f32>>"));
    assert!(text.contains("store"));
}
