use pulse_core::{decode_payload, encode_payload, parse_share_link, Payload};
use rand::{thread_rng, Rng};

#[test]
fn fuzz_decode_payload_never_panics() {
    let mut rng = thread_rng();
    for _ in 0..10_000 {
        let len: usize = rng.gen_range(0..512);
        let data: String = (0..len).map(|_| rng.gen::<char>()).collect();
        let _ = decode_payload(&data);
    }
}

#[test]
fn fuzz_parse_share_link_never_panics() {
    let mut rng = thread_rng();
    for _ in 0..10_000 {
        let len: usize = rng.gen_range(0..256);
        let data: String = (0..len).map(|_| rng.gen::<char>()).collect();
        let _ = parse_share_link(&data);
    }
}

#[test]
fn random_mutation_of_valid_wire_form_is_handled() {
    let mut rng = thread_rng();
    let valid = encode_payload(&Payload::Tick { seconds: 42 }).unwrap();

    for _ in 0..1_000 {
        let mut mutated: Vec<u8> = valid.clone().into_bytes();
        let flip_count = rng.gen_range(1..6);
        for _ in 0..flip_count {
            let idx = rng.gen_range(0..mutated.len());
            mutated[idx] ^= rng.gen::<u8>();
        }
        if let Ok(text) = String::from_utf8(mutated) {
            let _ = decode_payload(&text);
        }
    }
}
