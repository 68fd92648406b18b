mod common;

use tessel_interp::Buffer;
use tessel_program::{
    AtomicOp, Atom, Aval, BlockDim, BlockMapping, DType, GridSpec, Index, IndexerSpec, Primitive,
    Program, ProgramBuilder, float32, int32,
};

fn get(b: &mut ProgramBuilder, r: Atom, rank: usize) -> Atom {
    b.apply1(
        Primitive::Get {
            indexer: IndexerSpec::full(rank),
        },
        vec![r],
    )
    .unwrap()
}

fn set(b: &mut ProgramBuilder, r: Atom, v: Atom, rank: usize) {
    b.apply(
        Primitive::Swap {
            indexer: IndexerSpec::full(rank),
        },
        vec![r, v],
    )
    .unwrap();
}

fn f32_ref(shape: &[usize]) -> Aval {
    Aval::reference(shape.to_vec(), DType::Float32)
}

fn f32_array(shape: &[usize]) -> Aval {
    Aval::array(shape.to_vec(), DType::Float32)
}

/// `o = x + y` over blocks of `block` elements.
fn add_program(block: usize) -> Program {
    let mut b = ProgramBuilder::new();
    let x = Atom::Var(b.input(f32_ref(&[block])));
    let y = Atom::Var(b.input(f32_ref(&[block])));
    let o = Atom::Var(b.input(f32_ref(&[block])));
    let xv = get(&mut b, x, 1);
    let yv = get(&mut b, y, 1);
    let sum = b.apply1(Primitive::Add, vec![xv, yv]).unwrap();
    set(&mut b, o, sum, 1);
    b.finish(Vec::new()).unwrap()
}

fn iota(n: usize) -> Vec<f32> {
    (0..n).map(|i| i as f32).collect()
}

#[test]
fn vector_add_single_block() {
    let kernel = common::lower(&add_program(8), &vec![f32_array(&[8]); 3], &GridSpec::new(vec![1]));
    assert_eq!(kernel.grid, vec![1]);

    let memory = common::run_kernel(
        &kernel,
        vec![
            Buffer::from_f32(&iota(8)),
            Buffer::from_f32(&[10.0; 8]),
            Buffer::zeros(tessel_ir::Scalar::F32, 8),
        ],
    );
    let expected: Vec<f32> = (0..8).map(|i| i as f32 + 10.0).collect();
    assert_eq!(common::f32s(&memory, 2), expected);
}

#[test]
fn blocked_add_covers_every_block() {
    let mapping = BlockMapping {
        block_shape: vec![BlockDim::Extent(8)],
        index_map: common::index_map(1, &[Some(0)]),
    };
    let mut spec = GridSpec::new(vec![4]);
    spec.block_mappings = vec![Some(mapping); 3];

    let kernel = common::lower(&add_program(8), &vec![f32_array(&[32]); 3], &spec);
    assert_eq!(kernel.grid, vec![4]);

    let memory = common::run_kernel(
        &kernel,
        vec![
            Buffer::from_f32(&iota(32)),
            Buffer::from_f32(&iota(32)),
            Buffer::zeros(tessel_ir::Scalar::F32, 32),
        ],
    );
    let expected: Vec<f32> = (0..32).map(|i| 2.0 * i as f32).collect();
    assert_eq!(common::f32s(&memory, 2), expected);
}

#[test]
fn mapped_axes_select_one_row_per_program() {
    // o[r, :] = 2 * x[r, :] with the row axis consumed by the grid.
    let mut b = ProgramBuilder::new();
    let x = Atom::Var(b.input(f32_ref(&[8])));
    let o = Atom::Var(b.input(f32_ref(&[8])));
    let xv = get(&mut b, x, 1);
    let doubled = b.apply1(Primitive::Mul, vec![xv, float32(2.0)]).unwrap();
    set(&mut b, o, doubled, 1);
    let program = b.finish(Vec::new()).unwrap();

    let mapping = BlockMapping {
        block_shape: vec![BlockDim::Mapped, BlockDim::Extent(8)],
        index_map: common::index_map(1, &[Some(0), None]),
    };
    let mut spec = GridSpec::new(vec![4]);
    spec.block_mappings = vec![Some(mapping); 2];

    let kernel = common::lower(&program, &vec![f32_array(&[4, 8]); 2], &spec);
    let memory = common::run_kernel(
        &kernel,
        vec![
            Buffer::from_f32(&iota(32)),
            Buffer::zeros(tessel_ir::Scalar::F32, 32),
        ],
    );
    let expected: Vec<f32> = (0..32).map(|i| 2.0 * i as f32).collect();
    assert_eq!(common::f32s(&memory, 1), expected);
}

#[test]
fn gathers_follow_an_index_array() {
    let x_ref = f32_ref(&[8]);
    let mut b = ProgramBuilder::new();
    let x = Atom::Var(b.input(x_ref.clone()));
    let idx = Atom::Var(b.input(Aval::reference(vec![4], DType::Int32)));
    let o = Atom::Var(b.input(f32_ref(&[4])));
    let iv = get(&mut b, idx, 1);
    let (indexer, operands) = b.indexer(&x_ref, vec![Index::At(iv)]).unwrap();
    let mut inputs = vec![x];
    inputs.extend(operands);
    let gathered = b.apply1(Primitive::Get { indexer }, inputs).unwrap();
    set(&mut b, o, gathered, 1);
    let program = b.finish(Vec::new()).unwrap();

    let operands = [
        f32_array(&[8]),
        Aval::array(vec![4], DType::Int32),
        f32_array(&[4]),
    ];
    let kernel = common::lower(&program, &operands, &GridSpec::new(vec![1]));
    let memory = common::run_kernel(
        &kernel,
        vec![
            Buffer::from_f32(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0, 17.0]),
            Buffer::from_i32(&[7, 0, 3, 3]),
            Buffer::zeros(tessel_ir::Scalar::F32, 4),
        ],
    );
    assert_eq!(common::f32s(&memory, 2), vec![17.0, 10.0, 13.0, 13.0]);
}

#[test]
fn program_ids_index_scalar_stores() {
    // o[pid] = pid * 10
    let o_ref = Aval::reference(vec![4], DType::Int32);
    let mut b = ProgramBuilder::new();
    let o = Atom::Var(b.input(o_ref.clone()));
    let pid = b.apply1(Primitive::ProgramId { axis: 0 }, Vec::new()).unwrap();
    let value = b.apply1(Primitive::Mul, vec![pid.clone(), int32(10)]).unwrap();
    let (indexer, operands) = b.indexer(&o_ref, vec![Index::At(pid)]).unwrap();
    let mut inputs = vec![o];
    inputs.extend(operands);
    inputs.push(value);
    b.apply(Primitive::Swap { indexer }, inputs).unwrap();
    let program = b.finish(Vec::new()).unwrap();

    let kernel = common::lower(
        &program,
        &[Aval::array(vec![4], DType::Int32)],
        &GridSpec::new(vec![4]),
    );
    let memory = common::run_kernel(&kernel, vec![Buffer::from_i32(&[0; 4])]);
    assert_eq!(common::ints(&memory, 0), vec![0, 10, 20, 30]);
}

#[test]
fn mapped_grid_axes_are_hidden_from_program_id() {
    // o[pid] = pid + 100 on a (2, 3) grid whose axis 0 is mapped away.
    let o_ref = Aval::reference(vec![3], DType::Int32);
    let mut b = ProgramBuilder::new();
    let o = Atom::Var(b.input(o_ref.clone()));
    let pid = b.apply1(Primitive::ProgramId { axis: 0 }, Vec::new()).unwrap();
    let value = b.apply1(Primitive::Add, vec![pid.clone(), int32(100)]).unwrap();
    let (indexer, operands) = b.indexer(&o_ref, vec![Index::At(pid)]).unwrap();
    let mut inputs = vec![o];
    inputs.extend(operands);
    inputs.push(value);
    b.apply(Primitive::Swap { indexer }, inputs).unwrap();
    let program = b.finish(Vec::new()).unwrap();

    let mut spec = GridSpec::new(vec![2, 3]);
    spec.mapped_dims = vec![0];
    let kernel = common::lower(&program, &[Aval::array(vec![3], DType::Int32)], &spec);
    assert_eq!(kernel.grid, vec![2, 3]);
    let memory = common::run_kernel(&kernel, vec![Buffer::from_i32(&[0; 3])]);
    assert_eq!(common::ints(&memory, 0), vec![100, 101, 102]);
}

#[test]
fn scalar_arithmetic_on_literals() {
    // o = 2 * 3 + 4
    let mut b = ProgramBuilder::new();
    let o = Atom::Var(b.input(Aval::reference(Vec::new(), DType::Int32)));
    let product = b.apply1(Primitive::Mul, vec![int32(2), int32(3)]).unwrap();
    let sum = b.apply1(Primitive::Add, vec![product, int32(4)]).unwrap();
    set(&mut b, o, sum, 0);
    let program = b.finish(Vec::new()).unwrap();

    let kernel = common::lower(
        &program,
        &[Aval::scalar(DType::Int32)],
        &GridSpec::new(vec![1]),
    );
    let memory = common::run_kernel(&kernel, vec![Buffer::from_i32(&[0])]);
    assert_eq!(common::ints(&memory, 0), vec![10]);
}

/// `o = load(x, mask = iota < 5 [, other])`
fn masked_copy(other: Option<f64>) -> Program {
    let x_ref = f32_ref(&[8]);
    let mut b = ProgramBuilder::new();
    let x = Atom::Var(b.input(x_ref.clone()));
    let o = Atom::Var(b.input(x_ref));
    let lanes = b
        .apply1(
            Primitive::Iota {
                dtype: DType::Int32,
                shape: vec![8],
                dimension: 0,
            },
            Vec::new(),
        )
        .unwrap();
    let mask = b.apply1(Primitive::Lt, vec![lanes, int32(5)]).unwrap();
    let mut inputs = vec![x, mask];
    inputs.extend(other.map(float32));
    let loaded = b
        .apply1(
            Primitive::Load {
                indexer: IndexerSpec::full(1),
                masked: true,
                has_other: other.is_some(),
            },
            inputs,
        )
        .unwrap();
    set(&mut b, o, loaded, 1);
    b.finish(Vec::new()).unwrap()
}

#[test]
fn masked_loads_fill_inactive_lanes() {
    let operands = vec![f32_array(&[8]); 2];
    let inputs = || {
        vec![
            Buffer::from_f32(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]),
            Buffer::from_f32(&[9.0; 8]),
        ]
    };

    let kernel = common::lower(&masked_copy(None), &operands, &GridSpec::new(vec![1]));
    let memory = common::run_kernel(&kernel, inputs());
    assert_eq!(
        common::f32s(&memory, 1),
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 0.0, 0.0, 0.0]
    );

    let kernel = common::lower(&masked_copy(Some(-1.0)), &operands, &GridSpec::new(vec![1]));
    let memory = common::run_kernel(&kernel, inputs());
    assert_eq!(
        common::f32s(&memory, 1),
        vec![1.0, 2.0, 3.0, 4.0, 5.0, -1.0, -1.0, -1.0]
    );
}

#[test]
fn masked_stores_leave_inactive_lanes_untouched() {
    let x_ref = f32_ref(&[8]);
    let mut b = ProgramBuilder::new();
    let x = Atom::Var(b.input(x_ref.clone()));
    let o = Atom::Var(b.input(x_ref));
    let xv = get(&mut b, x, 1);
    let lanes = b
        .apply1(
            Primitive::Iota {
                dtype: DType::Int32,
                shape: vec![8],
                dimension: 0,
            },
            Vec::new(),
        )
        .unwrap();
    let mask = b.apply1(Primitive::Ge, vec![lanes, int32(6)]).unwrap();
    b.apply(
        Primitive::MaskedSwap {
            indexer: IndexerSpec::full(1),
            masked: true,
        },
        vec![o, xv, mask],
    )
    .unwrap();
    let program = b.finish(Vec::new()).unwrap();

    let kernel = common::lower(&program, &vec![f32_array(&[8]); 2], &GridSpec::new(vec![1]));
    let memory = common::run_kernel(
        &kernel,
        vec![Buffer::from_f32(&iota(8)), Buffer::from_f32(&[-1.0; 8])],
    );
    assert_eq!(
        common::f32s(&memory, 1),
        vec![-1.0, -1.0, -1.0, -1.0, -1.0, -1.0, 6.0, 7.0]
    );
}

#[test]
fn atomic_adds_accumulate_across_programs() {
    let mut b = ProgramBuilder::new();
    let x = Atom::Var(b.input(f32_ref(&[4])));
    let o = Atom::Var(b.input(f32_ref(&[4])));
    let xv = get(&mut b, x, 1);
    b.apply(
        Primitive::AtomicRmw {
            indexer: IndexerSpec::full(1),
            atomic: AtomicOp::Add,
            masked: false,
        },
        vec![o, xv],
    )
    .unwrap();
    let program = b.finish(Vec::new()).unwrap();

    let kernel = common::lower(&program, &vec![f32_array(&[4]); 2], &GridSpec::new(vec![4]));
    let memory = common::run_kernel(
        &kernel,
        vec![
            Buffer::from_f32(&[1.0, 2.0, 3.0, 4.0]),
            Buffer::zeros(tessel_ir::Scalar::F32, 4),
        ],
    );
    assert_eq!(common::f32s(&memory, 1), vec![4.0, 8.0, 12.0, 16.0]);
}

#[test]
fn loops_carry_accumulators() {
    // acc += x, three times
    let mut body = ProgramBuilder::new();
    body.input(Aval::scalar(DType::Int32));
    let bx = Atom::Var(body.input(f32_ref(&[4])));
    let bacc = Atom::Var(body.input(f32_ref(&[4])));
    let xv = get(&mut body, bx, 1);
    let av = get(&mut body, bacc.clone(), 1);
    let sum = body.apply1(Primitive::Add, vec![av, xv]).unwrap();
    set(&mut body, bacc, sum, 1);
    let body = body.finish(Vec::new()).unwrap();

    let mut b = ProgramBuilder::new();
    let x = Atom::Var(b.input(f32_ref(&[4])));
    let o = Atom::Var(b.input(f32_ref(&[4])));
    let xv = get(&mut b, x, 1);
    let acc = get(&mut b, o.clone(), 1);
    let outs = b
        .apply(
            Primitive::For {
                body: Box::new(body),
                nsteps: 3,
                reverse: false,
                unroll: 1,
            },
            vec![xv, acc],
        )
        .unwrap();
    set(&mut b, o, Atom::Var(outs[1]), 1);
    let program = b.finish(Vec::new()).unwrap();

    let kernel = common::lower(&program, &vec![f32_array(&[4]); 2], &GridSpec::new(vec![1]));
    let memory = common::run_kernel(
        &kernel,
        vec![
            Buffer::from_f32(&[1.0, 2.0, 3.0, 4.0]),
            Buffer::from_f32(&[0.5; 4]),
        ],
    );
    assert_eq!(common::f32s(&memory, 1), vec![3.5, 6.5, 9.5, 12.5]);
}

#[test]
fn row_sums_reduce_the_minor_axis() {
    let mut b = ProgramBuilder::new();
    let x = Atom::Var(b.input(f32_ref(&[2, 4])));
    let o = Atom::Var(b.input(f32_ref(&[2])));
    let xv = get(&mut b, x, 2);
    let sums = b
        .apply1(Primitive::ReduceSum { axes: vec![1] }, vec![xv])
        .unwrap();
    set(&mut b, o, sums, 1);
    let program = b.finish(Vec::new()).unwrap();

    let kernel = common::lower(
        &program,
        &[f32_array(&[2, 4]), f32_array(&[2])],
        &GridSpec::new(vec![1]),
    );
    let memory = common::run_kernel(
        &kernel,
        vec![
            Buffer::from_f32(&iota(8)),
            Buffer::zeros(tessel_ir::Scalar::F32, 2),
        ],
    );
    assert_eq!(common::f32s(&memory, 1), vec![6.0, 22.0]);
}
