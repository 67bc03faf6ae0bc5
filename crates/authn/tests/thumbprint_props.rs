//! Property tests for credential issuance: whatever the key and tenant, the
//! registered key ID is the thumbprint of the issued public key.

#![allow(clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use keygrant_authn::{Credential, CredentialIssuer, SeededGenerator, thumbprint};
use keygrant_storage::{KeyReader, MemoryKeyStore, TenantDescriptor};
use proptest::prelude::*;

fn arb_tenant() -> impl Strategy<Value = TenantDescriptor> {
    ("[a-z0-9-]{1,32}", "\\PC{0,24}", "\\PC{0,24}", "[a-z]{1,12}").prop_map(
        |(tenant_id, tenant_name, application_name, created_by)| {
            TenantDescriptor::builder()
                .tenant_id(tenant_id)
                .tenant_name(tenant_name)
                .application_name(application_name)
                .created_by(created_by)
                .build()
        },
    )
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().build().expect("runtime")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The issued key ID, the stored record and the bundle all agree on the
    /// thumbprint of the generated key.
    #[test]
    fn issued_key_id_is_thumbprint(seed in any::<[u8; 32]>(), tenant in arb_tenant()) {
        let store = Arc::new(MemoryKeyStore::new());
        let issuer = CredentialIssuer::new(store.clone());

        let issued = runtime()
            .block_on(issuer.issue(tenant.clone(), &SeededGenerator::new(seed)))
            .expect("issuance succeeds");
        let expected = thumbprint(&issued.credential.key.verifying_key());
        prop_assert_eq!(issued.key_id(), &expected);

        let record = runtime()
            .block_on(store.get_key(&expected))
            .expect("get")
            .expect("record present");
        prop_assert_eq!(&record.tenant, &tenant);
        prop_assert_eq!(&record.identity_id, issued.identity_id());
        prop_assert_eq!(record.public_key, issued.credential.key.public_key_b64());

        let parsed = Credential::from_bundle(&issued.bundle).expect("bundle parses");
        prop_assert_eq!(&parsed.key_id, &expected);
        prop_assert_eq!(&parsed.identity_id, issued.identity_id());
        prop_assert_eq!(parsed.key.verifying_key(), issued.credential.key.verifying_key());
    }

    /// Distinct seeds never share a key ID.
    #[test]
    fn distinct_keys_have_distinct_thumbprints(a in any::<[u8; 32]>(), b in any::<[u8; 32]>()) {
        prop_assume!(a != b);
        let ka = keygrant_authn::PrivateKey::from_bytes(&a);
        let kb = keygrant_authn::PrivateKey::from_bytes(&b);
        prop_assert_ne!(ka.key_id(), kb.key_id());
    }
}
