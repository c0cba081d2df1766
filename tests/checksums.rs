use fluxcodec::util::{amiga_checksum, crc_brother, crc_ibm_3740, micropolis_checksum, northstar_checksum, sum_bytes, xor_bytes};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn bytes(hex_str: &str) -> Vec<u8> {
    hex::decode(hex_str).unwrap()
}

#[test]
fn crc_ibm_3740_vectors() {
    init();
    assert_eq!(crc_ibm_3740(b"123456789", None), 0x29B1);
    assert_eq!(crc_ibm_3740(&[], None), 0xFFFF);
    // ID field of cylinder 0, head 0, sector 1, 512 bytes.
    assert_eq!(crc_ibm_3740(&bytes("a1a1a1fe00000102"), None), 0xCA6F);
}

#[test]
fn crc_residue_is_zero() {
    init();
    let mut field = bytes("a1a1a1fb");
    field.extend([0xE5; 512]);
    let crc = crc_ibm_3740(&field, None);
    field.extend(crc.to_be_bytes());
    assert_eq!(crc_ibm_3740(&field, None), 0);
}

#[test]
fn crc_brother_vectors() {
    init();
    assert_eq!(crc_brother(b"123456789"), 0xCD_E703);
    assert_eq!(crc_brother(&[]), 0);
    assert_eq!(crc_brother(&bytes("01")), 0x86_4CFB);
    assert_eq!(crc_brother(&bytes("313233343536373839cde703")), 0);
}

#[test]
fn amiga_checksum_vectors() {
    init();
    assert_eq!(amiga_checksum(&bytes("12345678ffffffff")), 0x4541_0105);
    assert_eq!(amiga_checksum(&bytes("aaaaaaaa")), 0);
    // A trailing partial word is ignored.
    assert_eq!(amiga_checksum(&bytes("12345678ff")), 0x1234_5678 & 0x5555_5555);
}

#[test]
fn northstar_checksum_vectors() {
    init();
    assert_eq!(northstar_checksum(&bytes("01")), 0x02);
    assert_eq!(northstar_checksum(&bytes("0102")), 0x00);
    assert_eq!(northstar_checksum(&bytes("80")), 0x01);
    assert_eq!(northstar_checksum(&[]), 0x00);
}

#[test]
fn micropolis_checksum_vectors() {
    init();
    assert_eq!(micropolis_checksum(&bytes("ffff")), 0xFE);
    assert_eq!(micropolis_checksum(&bytes("ffff01")), 0x00);
    assert_eq!(micropolis_checksum(&bytes("010203")), 0x06);
}

#[test]
fn additive_and_xor_vectors() {
    init();
    assert_eq!(sum_bytes(&[0xFF; 512]), 0xFE00);
    assert_eq!(sum_bytes(&bytes("0102fffe")), 0x0200);
    assert_eq!(xor_bytes(&bytes("0f0ff0f0")), 0x00);
    assert_eq!(xor_bytes(&bytes("01020408")), 0x0F);
}
