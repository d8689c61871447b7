use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use syllabus_core::{keys, RequestContext, TenantId};

fn bench_key_scoping(c: &mut Criterion) {
    let tenant = TenantId::now_v7();
    let ctx = RequestContext::for_tenant(tenant);

    c.bench_function("keys/scope_course", |b| {
        b.iter(|| {
            let id = ctx.tenant_id().expect("tenant context");
            black_box(keys::course(black_box(42u64)).scoped(id));
        });
    });

    c.bench_function("keys/scope_listing_pattern", |b| {
        b.iter(|| {
            black_box(keys::course_listing_for_status(black_box("in*review")).scoped(tenant));
        });
    });
}

criterion_group!(benches, bench_key_scoping);
criterion_main!(benches);
