use hoard_crypto::{decrypt_convergent, encrypt_convergent, secure_hash};

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_encrypt_convergent(bencher: divan::Bencher, size: usize) {
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| encrypt_convergent(divan::black_box(&data), divan::black_box(b"salt")).unwrap());
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_decrypt_convergent(bencher: divan::Bencher, size: usize) {
    let data = make_data(size);
    let blob = encrypt_convergent(&data, b"salt").unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            decrypt_convergent(
                divan::black_box(&blob.encrypted_data),
                b"salt",
                divan::black_box(&blob.secret_key),
            )
            .unwrap()
        });
}

#[divan::bench(args = [1024, 1048576])]
fn bench_secure_hash(bencher: divan::Bencher, size: usize) {
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| secure_hash(divan::black_box(&data)));
}

fn main() {
    divan::main();
}
