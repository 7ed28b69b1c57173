// Signing and verification benchmarks for the Tessera protocol.
//
// Covers Ed25519 keypair generation, batch digests at various call counts,
// and signing and verifying a batch authorization.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use tessera_protocol::crypto::Keypair;
use tessera_protocol::{Address, Amount, AssetId, BatchAuthorization, Call};

fn authorization(calls: usize) -> BatchAuthorization {
    BatchAuthorization {
        account: Address::new("acct:alice"),
        calls: (0..calls)
            .map(|i| Call::Deposit {
                asset: AssetId((i % 8) as u16),
                amount: Amount::Exact(1_000 + i as u128),
            })
            .collect(),
        nonce: 42,
        deadline: 1_700_000_600,
    }
}

fn bench_keypair_generation(c: &mut Criterion) {
    c.bench_function("ed25519/keypair_generate", |b| {
        b.iter(Keypair::generate);
    });
}

fn bench_digest(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch/digest");

    for size in [1, 10, 50] {
        let auth = authorization(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &auth, |b, auth| {
            b.iter(|| auth.digest().unwrap());
        });
    }

    group.finish();
}

fn bench_sign_batch(c: &mut Criterion) {
    let keypair = Keypair::generate();
    let auth = authorization(4);

    c.bench_function("ed25519/sign_batch", |b| {
        b.iter(|| auth.clone().sign(&keypair).unwrap());
    });
}

fn bench_verify_batch(c: &mut Criterion) {
    let keypair = Keypair::generate();
    let signed = authorization(4).sign(&keypair).unwrap();
    let public_key = keypair.public_key();

    c.bench_function("ed25519/verify_batch", |b| {
        b.iter(|| {
            let digest = signed.authorization.digest().unwrap();
            public_key.verify(&digest, &signed.signature)
        });
    });
}

criterion_group!(
    benches,
    bench_keypair_generation,
    bench_digest,
    bench_sign_batch,
    bench_verify_batch,
);
criterion_main!(benches);
