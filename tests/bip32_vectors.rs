use hex_literal::hex;

use btc_wire_keys::hd::{
    ChildNumber, DerivationPath, DeterministicHierarchy, ExtendedKey, HdError, derive_master_key,
    derive_path,
};
use btc_wire_keys::wire::Network;

const H: u32 = ChildNumber::HARDENED_BIT;

struct TestVector {
    seed: &'static [u8],
    derivations: &'static [Derivation],
}

struct Derivation {
    path: &'static [u32],

    expected_chain_code: [u8; 32],
    expected_secret_key: [u8; 32],
    expected_public_key: [u8; 33],
}

/// Test vectors defined in
/// https://github.com/bitcoin/bips/blob/master/bip-0032.mediawiki#test-vectors
const TEST_VECTORS: &[TestVector] = &[
    // Test vector 1
    TestVector {
        seed: &hex!("000102030405060708090a0b0c0d0e0f"),
        derivations: &[
            Derivation {
                path: &[],
                expected_chain_code: hex!(
                    "873dff81c02f525623fd1fe5167eac3a55a049de3d314bb42ee227ffed37d508"
                ),
                expected_secret_key: hex!(
                    "e8f32e723decf4051aefac8e2c93c9c5b214313817cdb01a1494b917c8436b35"
                ),
                expected_public_key: hex!(
                    "0339a36013301597daef41fbe593a02cc513d0b55527ec2df1050e2e8ff49c85c2"
                ),
            },
            Derivation {
                path: &[H],
                expected_chain_code: hex!(
                    "47fdacbd0f1097043b78c63c20c34ef4ed9a111d980047ad16282c7ae6236141"
                ),
                expected_secret_key: hex!(
                    "edb2e14f9ee77d26dd93b4ecede8d16ed408ce149b6cd80b0715a2d911a0afea"
                ),
                expected_public_key: hex!(
                    "035a784662a4a20a65bf6aab9ae98a6c068a81c52e4b032c0fb5400c706cfccc56"
                ),
            },
            Derivation {
                path: &[H, 1],
                expected_chain_code: hex!(
                    "2a7857631386ba23dacac34180dd1983734e444fdbf774041578e9b6adb37c19"
                ),
                expected_secret_key: hex!(
                    "3c6cb8d0f6a264c91ea8b5030fadaa8e538b020f0a387421a12de9319dc93368"
                ),
                expected_public_key: hex!(
                    "03501e454bf00751f24b1b489aa925215d66af2234e3891c3b21a52bedb3cd711c"
                ),
            },
            Derivation {
                path: &[H, 1, 2 + H],
                expected_chain_code: hex!(
                    "04466b9cc8e161e966409ca52986c584f07e9dc81f735db683c3ff6ec7b1503f"
                ),
                expected_secret_key: hex!(
                    "cbce0d719ecf7431d88e6a89fa1483e02e35092af60c042b1df2ff59fa424dca"
                ),
                expected_public_key: hex!(
                    "0357bfe1e341d01c69fe5654309956cbea516822fba8a601743a012a7896ee8dc2"
                ),
            },
            Derivation {
                path: &[H, 1, 2 + H, 2],
                expected_chain_code: hex!(
                    "cfb71883f01676f587d023cc53a35bc7f88f724b1f8c2892ac1275ac822a3edd"
                ),
                expected_secret_key: hex!(
                    "0f479245fb19a38a1954c5c7c0ebab2f9bdfd96a17563ef28a6a4b1a2a764ef4"
                ),
                expected_public_key: hex!(
                    "02e8445082a72f29b75ca48748a914df60622a609cacfce8ed0e35804560741d29"
                ),
            },
            Derivation {
                path: &[H, 1, 2 + H, 2, 1000000000],
                expected_chain_code: hex!(
                    "c783e67b921d2beb8f6b389cc646d7263b4145701dadd2161548a8b078e65e9e"
                ),
                expected_secret_key: hex!(
                    "471b76e389e528d6de6d816857e012c5455051cad6660850e58372a6c3e6e7c8"
                ),
                expected_public_key: hex!(
                    "022a471424da5e657499d1ff51cb43c47481a03b1e77f951fe64cec9f5a48f7011"
                ),
            },
        ],
    },
    // Test vector 2
    TestVector {
        seed: &hex!(
            "fffcf9f6f3f0edeae7e4e1dedbd8d5d2cfccc9c6c3c0bdbab7b4b1aeaba8a5a2
             9f9c999693908d8a8784817e7b7875726f6c696663605d5a5754514e4b484542"
        ),
        derivations: &[
            Derivation {
                path: &[],
                expected_chain_code: hex!(
                    "60499f801b896d83179a4374aeb7822aaeaceaa0db1f85ee3e904c4defbd9689"
                ),
                expected_secret_key: hex!(
                    "4b03d6fc340455b363f51020ad3ecca4f0850280cf436c70c727923f6db46c3e"
                ),
                expected_public_key: hex!(
                    "03cbcaa9c98c877a26977d00825c956a238e8dddfbd322cce4f74b0b5bd6ace4a7"
                ),
            },
            Derivation {
                path: &[0],
                expected_chain_code: hex!(
                    "f0909affaa7ee7abe5dd4e100598d4dc53cd709d5a5c2cac40e7412f232f7c9c"
                ),
                expected_secret_key: hex!(
                    "abe74a98f6c7eabee0428f53798f0ab8aa1bd37873999041703c742f15ac7e1e"
                ),
                expected_public_key: hex!(
                    "02fc9e5af0ac8d9b3cecfe2a888e2117ba3d089d8585886c9c826b6b22a98d12ea"
                ),
            },
            Derivation {
                path: &[0, 2147483647 + H],
                expected_chain_code: hex!(
                    "be17a268474a6bb9c61e1d720cf6215e2a88c5406c4aee7b38547f585c9a37d9"
                ),
                expected_secret_key: hex!(
                    "877c779ad9687164e9c2f4f0f4ff0340814392330693ce95a58fe18fd52e6e93"
                ),
                expected_public_key: hex!(
                    "03c01e7425647bdefa82b12d9bad5e3e6865bee0502694b94ca58b666abc0a5c3b"
                ),
            },
            Derivation {
                path: &[0, 2147483647 + H, 1],
                expected_chain_code: hex!(
                    "f366f48f1ea9f2d1d3fe958c95ca84ea18e4c4ddb9366c336c927eb246fb38cb"
                ),
                expected_secret_key: hex!(
                    "704addf544a06e5ee4bea37098463c23613da32020d604506da8c0518e1da4b7"
                ),
                expected_public_key: hex!(
                    "03a7d1d856deb74c508e05031f9895dab54626251b3806e16b4bd12e781a7df5b9"
                ),
            },
            Derivation {
                path: &[0, 2147483647 + H, 1, 2147483646 + H],
                expected_chain_code: hex!(
                    "637807030d55d01f9a0cb3a7839515d796bd07706386a6eddf06cc29a65a0e29"
                ),
                expected_secret_key: hex!(
                    "f1c7c871a54a804afe328b4c83a1c33b8e5ff48f5087273f04efa83b247d6a2d"
                ),
                expected_public_key: hex!(
                    "02d2b36900396c9282fa14628566582f206a5dd0bcc8d5e892611806cafb0301f0"
                ),
            },
            Derivation {
                path: &[0, 2147483647 + H, 1, 2147483646 + H, 2],
                expected_chain_code: hex!(
                    "9452b549be8cea3ecb7a84bec10dcfd94afe4d129ebfd3b3cb58eedf394ed271"
                ),
                expected_secret_key: hex!(
                    "bb7d39bdb83ecf58f2fd82b6d918341cbef428661ef01ab97c28a4842125ac23"
                ),
                expected_public_key: hex!(
                    "024d902e1a2fc7a8755ab5b694c575fce742c48d9ff192e63df5193e4c7afe1f9c"
                ),
            },
        ],
    },
];

fn to_path(raw: &[u32]) -> DerivationPath {
    raw.iter().copied().map(ChildNumber::from).collect::<Vec<_>>().into()
}

#[test]
fn test_vectors() {
    for vector in TEST_VECTORS {
        let master = derive_master_key(vector.seed).unwrap();
        for derivation in vector.derivations {
            let key = derive_path(&master, &to_path(derivation.path)).unwrap();

            assert_eq!(key.chain_code(), &derivation.expected_chain_code);
            assert_eq!(
                *key.private_key_bytes().unwrap(),
                derivation.expected_secret_key
            );
            assert_eq!(key.public_key_bytes(), derivation.expected_public_key);
            assert_eq!(key.depth() as usize, derivation.path.len());
        }
    }
}

#[test]
fn hierarchy_matches_vectors() {
    let vector = &TEST_VECTORS[0];
    let hierarchy = DeterministicHierarchy::new(derive_master_key(vector.seed).unwrap());
    for derivation in vector.derivations {
        let key = hierarchy.get(&to_path(derivation.path), false, true).unwrap();
        assert_eq!(key.public_key_bytes(), derivation.expected_public_key);
    }
    assert_eq!(hierarchy.len(), vector.derivations.len());
}

#[test]
fn master_identifier_and_serialization() {
    let master = derive_master_key(&hex!("000102030405060708090a0b0c0d0e0f")).unwrap();

    assert_eq!(
        master.identifier(),
        hex!("3442193e1bb70916e914552172cd4e2dbc9df811")
    );
    assert_eq!(master.fingerprint(), hex!("3442193e"));
    assert_eq!(master.parent_fingerprint(), [0u8; 4]);
    assert_eq!(
        master.to_xpub(Network::Mainnet),
        "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8"
    );
    assert_eq!(
        master.to_xprv(Network::Mainnet).unwrap(),
        "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi"
    );

    let child = derive_path(&master, &"m/0H".parse().unwrap()).unwrap();
    assert_eq!(child.parent_fingerprint(), hex!("3442193e"));
    assert_eq!(
        child.to_xpub(Network::Mainnet),
        "xpub68Gmy5EdvgibQVfPdqkBBCHxA5htiqg55crXYuXoQRKfDBFA1WEjWgP6LHhwBZeNK1VTsfTFUHCdrfp1bgwQ9xv5ski8PX9rL2dZXvgGDnw"
    );
    assert_eq!(
        child.to_xprv(Network::Mainnet).unwrap(),
        "xprv9uHRZZhk6KAJC1avXpDAp4MDc3sQKNxDiPvvkX8Br5ngLNv1TxvUxt4cV1rGL5hj6KCesnDYUhd7oWgT11eZG7XnxHrnYeSvkzY7d2bhkJ7"
    );
}

#[test]
fn master_keys_from_raw_bytes() {
    let vector = &TEST_VECTORS[0].derivations[0];
    let from_seed = derive_master_key(TEST_VECTORS[0].seed).unwrap();

    let private = ExtendedKey::master_from_private_bytes(
        &vector.expected_secret_key,
        &vector.expected_chain_code,
    )
    .unwrap();
    assert_eq!(private, from_seed);

    let public = ExtendedKey::master_from_public_bytes(
        &vector.expected_public_key,
        &vector.expected_chain_code,
    )
    .unwrap();
    assert_eq!(public, from_seed.neuter());

    // public derivation from the raw watching key matches vector 1 m/0H/1
    let hardened = derive_path(&from_seed, &to_path(&[H])).unwrap();
    let watching = ExtendedKey::master_from_public_bytes(
        &hardened.public_key_bytes(),
        hardened.chain_code(),
    )
    .unwrap();
    let child = derive_path(&watching, &to_path(&[1])).unwrap();
    assert_eq!(
        child.public_key_bytes(),
        TEST_VECTORS[0].derivations[2].expected_public_key
    );

    assert!(matches!(
        ExtendedKey::master_from_private_bytes(&[0u8; 32], &vector.expected_chain_code),
        Err(HdError::InvalidKeyBytes(_))
    ));
    let mut not_on_curve = [0u8; 33];
    not_on_curve[0] = 0x02;
    not_on_curve[32] = 0x07;
    assert!(matches!(
        ExtendedKey::master_from_public_bytes(&not_on_curve, &vector.expected_chain_code),
        Err(HdError::InvalidKeyBytes(_))
    ));
}

#[test]
fn vector_2_master_serialization() {
    let master = derive_master_key(TEST_VECTORS[1].seed).unwrap();
    assert_eq!(
        master.to_xpub(Network::Mainnet),
        "xpub661MyMwAqRbcFW31YEwpkMuc5THy2PSt5bDMsktWQcFF8syAmRUapSCGu8ED9W6oDMSgv6Zz8idoc4a6mr8BDzTJY47LJhkJ8UB7WEGuduB"
    );
    assert_eq!(
        master.to_xprv(Network::Mainnet).unwrap(),
        "xprv9s21ZrQH143K31xYSDQpPDxsXRTUcvj2iNHm5NUtrGiGG5e2DtALGdso3pGz6ssrdK4PFmM8NSpSBHNqPqm55Qn3LqFtT2emdEXVYsCzC2U"
    );
}

#[test]
fn parsed_xpub_derives_public_children() {
    let master = derive_master_key(TEST_VECTORS[0].seed).unwrap();
    let (parsed, network) = ExtendedKey::from_base58(&master.to_xpub(Network::Mainnet)).unwrap();
    assert_eq!(network, Network::Mainnet);
    assert!(parsed.is_watching());

    let hierarchy = DeterministicHierarchy::new(parsed);
    let child = hierarchy.get(&"M/0/1".parse().unwrap(), false, true).unwrap();
    let expected = derive_path(&master, &"M/0/1".parse().unwrap()).unwrap();
    assert_eq!(child, expected.neuter());

    assert_eq!(
        hierarchy.get(&"M/0H".parse().unwrap(), false, true),
        Err(HdError::PrivateDerivationFromPublic)
    );
}

/// Invalid extended keys from test vector 5.
#[test]
fn invalid_serialized_keys_are_rejected() {
    let cases = [
        // pubkey version / prvkey mismatch
        "xpub661MyMwAqRbcEYS8w7XLSVeEsBXy79zSzH1J8vCdxAZningWLdN3zgtU6LBpB85b3D2yc8sfvZU521AAwdZafEz7mnzBBsz4wKY5fTtTQBm",
        // invalid pubkey prefix 04
        "xpub661MyMwAqRbcEYS8w7XLSVeEsBXy79zSzH1J8vCdxAZningWLdN3zgtU6Txnt3siSujt9RCVYsx4qHZGc62TG4McvMGcAUjeuwZdduYEvFn",
        // zero depth with non-zero parent fingerprint
        "xpub661no6RGEX3uJkY4bNnPcw4URcQTrSibUZ4NqJEw5eBkv7ovTwgiT91XX27VbEXGENhYRCf7hyEbWrR3FewATdCEebj6znwMfQkhRYHRLpJ",
        // zero depth with non-zero index
        "xpub661MyMwAuDcm6CRQ5N4qiHKrJ39Xe1R1NyfouMKTTWcguwVcfrZJaNvhpebzGerh7gucBvzEQWRugZDuDXjNDRmXzSZe4c7mnTK97pTvGS8",
        // invalid pubkey 020000000000000000000000000000000000000000000000000000000000000007
        "xpub661MyMwAqRbcEYS8w7XLSVeEsBXy79zSzH1J8vCdxAZningWLdN3zgtU6Q5JXayek4PRsn35jii4veMimro1xefsM58PgBMrvdYre8QyULY",
        // prvkey version / pubkey mismatch
        "xprv9s21ZrQH143K24Mfq5zL5MhWK9hUhhGbd45hLXo2Pq2oqzMMo63oStZzFGTQQD3dC4H2D5GBj7vWvSQaaBv5cxi9gafk7NF3pnBju6dwKvH",
        // private key 0 not in 1..n-1
        "xprv9s21ZrQH143K24Mfq5zL5MhWK9hUhhGbd45hLXo2Pq2oqzMMo63oStZzF93Y5wvzdUayhgkkFoicQZcP3y52uPPxFnfoLZB21Teqt1VvEHx",
        // private key n not in 1..n-1
        "xprv9s21ZrQH143K24Mfq5zL5MhWK9hUhhGbd45hLXo2Pq2oqzMMo63oStZzFAzHGBP2UuGCqWLTAPLcMtD5SDKr24z3aiUvKr9bJpdrcLg1y3G",
    ];
    for key in cases {
        assert!(
            matches!(
                ExtendedKey::from_base58(key),
                Err(HdError::InvalidSerializedKey(_))
            ),
            "{key}"
        );
    }

    // invalid checksum
    assert!(matches!(
        ExtendedKey::from_base58(
            "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHL"
        ),
        Err(HdError::Base58(_))
    ));
}
