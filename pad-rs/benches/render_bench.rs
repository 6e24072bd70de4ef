use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pad::lang::compiler::compile;
use pad::lang::tokenizer::{tokenize, TokenizerOptions};
use pad::lang::tokens::Source;
use pad::lang::Kit;

fn make_template(rows: usize) -> String {
    let mut src = String::from(
        "{@ def row(i, name) @}<tr><td>{{ i }}</td><td>{{ name.upper() }}</td></tr>\n{@ end @}\n<table>\n",
    );
    src.push_str(&format!(
        "{{@ for i = 0; i < {rows}; i += 1 @}}{{@ row(i, \"item\" + \"-x\") @}}{{@ end @}}\n"
    ));
    src.push_str("</table>\n");
    src.push_str(&"Some static text between blocks. {{ 1 + 2 * 3 }}\n".repeat(rows));
    src
}

fn bench_render(c: &mut Criterion) {
    let small = make_template(10);
    let large = make_template(1000);
    let opts = TokenizerOptions::default();

    let mut g = c.benchmark_group("render");

    g.bench_function("tokenize_large", |b| {
        let src = Source::new("<bench>", large.as_str());
        b.iter(|| tokenize(black_box(&src), &opts))
    });

    g.bench_function("compile_large", |b| {
        let src = Source::new("<bench>", large.as_str());
        let tokens = tokenize(&src, &opts).unwrap();
        b.iter(|| compile(black_box(&tokens), &src))
    });

    g.bench_function("render_small", |b| {
        b.iter(|| {
            let mut kit = Kit::new();
            kit.compile_from_str(black_box(&small)).unwrap()
        })
    });

    g.bench_function("render_large", |b| {
        b.iter(|| {
            let mut kit = Kit::new();
            kit.compile_from_str(black_box(&large)).unwrap()
        })
    });

    g.finish();
}

criterion_group!(benches, bench_render);
criterion_main!(benches);
