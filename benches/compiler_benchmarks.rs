// CCScript - A compiler for the CCScript event-scripting language
// Copyright (C) 2026  The CCScript Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Benchmarks for the compiler pipeline stages.
//!
//! Run with `cargo bench`. Results land in target/criterion/.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::path::Path;

use ccscript::error::Diagnostics;
use ccscript::{CodeBuffer, Module, Project};

/// A synthetic module exercising strings, control flow, commands, and
/// labels, sized by repetition count.
fn synthetic_source(blocks: usize) -> String {
    let mut source = String::from(
        "command greet(who) { \"Hello, \" who \"![02]\" }\n\
         define price = 0x12\n",
    );
    for i in 0..blocks {
        source.push_str(&format!(
            "entry_{i}:\n\
             if flag {i} {{\n\
                 greet(\"wanderer\")\n\
                 menu {{ \"yes\": \"ok[02]\" \"no\": \"bye[02]\" }}\n\
             }} else {{\n\
                 \"Nothing here.[02]\" short price\n\
             }}\n\
             entry_{i}\n",
            i = i
        ));
    }
    source
}

fn compile_once(source: &str) -> usize {
    let diag = Diagnostics::new();
    let project = Project::new(&diag);
    let module = Module::from_source(Path::new("bench.ccs"), source, &diag, &project.counters);
    project.add_module(&module);
    module.execute(&project);
    assert!(!diag.has_errors());
    module.set_base_address(0xC00000);
    module.resolve_references();
    module.code_size()
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    for blocks in [10usize, 100] {
        let source = synthetic_source(blocks);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_function(format!("compile_{}_blocks", blocks), |b| {
            b.iter(|| compile_once(black_box(&source)))
        });
    }
    group.finish();
}

fn bench_buffer_ops(c: &mut Criterion) {
    let mut chunk = CodeBuffer::new();
    for i in 0..256u32 {
        chunk.append_byte(i & 0xFF);
    }

    c.bench_function("buffer_append_4k", |b| {
        b.iter(|| {
            let mut buf = CodeBuffer::new();
            for _ in 0..16 {
                buf.append(black_box(&chunk));
            }
            buf.len()
        })
    });

    c.bench_function("buffer_substring_half", |b| {
        b.iter(|| black_box(&chunk).substring(64, 128).unwrap().len())
    });
}

criterion_group!(benches, bench_pipeline, bench_buffer_ops);
criterion_main!(benches);
